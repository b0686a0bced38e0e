#[cfg(test)]
mod support;

#[cfg(test)]
mod ordering_tests;
#[cfg(test)]
mod scenario_tests;
