//! Cycle type and the latency/bandwidth server used by target models.
//!
//! A `TimedServer` finishes each request `base_latency + ceil(bytes / bytes_per_cycle)` cycles
//! after it starts, starting no earlier than the previous request's finish.  A full queue hands
//! the request back so the caller can hold it on its input and retry.

use std::collections::VecDeque;

pub type Cycle = u64;

/// When an accepted request will be done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    issued_at: Cycle,
    ready_at: Cycle,
}

impl Ticket {
    pub fn issued_at(&self) -> Cycle {
        self.issued_at
    }

    pub fn ready_at(&self) -> Cycle {
        self.ready_at
    }
}

#[derive(Debug)]
pub struct ServiceRequest<T> {
    pub payload: T,
    pub size_bytes: u32,
}

impl<T> ServiceRequest<T> {
    pub fn new(payload: T, size_bytes: u32) -> Self {
        Self { payload, size_bytes }
    }
}

/// The server queue was full; the request is returned untouched.
#[derive(Debug)]
pub struct QueueFull<T> {
    pub request: ServiceRequest<T>,
    pub capacity: usize,
}

impl<T> QueueFull<T> {
    pub fn into_request(self) -> ServiceRequest<T> {
        self.request
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    pub base_latency: Cycle,
    pub bytes_per_cycle: u32,
    /// Requests accepted but not yet drained.
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_latency: 0,
            bytes_per_cycle: 1,
            queue_capacity: 1,
        }
    }
}

#[derive(Debug)]
pub struct TimedServer<T> {
    config: ServerConfig,
    inflight: VecDeque<(T, Ticket)>,
    busy_until: Cycle,
}

impl<T> TimedServer<T> {
    /// Zero bandwidth or capacity is clamped to one.
    pub fn new(config: ServerConfig) -> Self {
        let config = ServerConfig {
            bytes_per_cycle: config.bytes_per_cycle.max(1),
            queue_capacity: config.queue_capacity.max(1),
            ..config
        };
        Self {
            config,
            inflight: VecDeque::with_capacity(config.queue_capacity),
            busy_until: 0,
        }
    }

    pub fn try_enqueue(&mut self, now: Cycle, request: ServiceRequest<T>) -> Result<Ticket, QueueFull<T>> {
        if self.inflight.len() >= self.config.queue_capacity {
            return Err(QueueFull {
                request,
                capacity: self.config.queue_capacity,
            });
        }

        let start = self.busy_until.max(now);
        let service = (request.size_bytes as u64).div_ceil(self.config.bytes_per_cycle as u64);
        let ticket = Ticket {
            issued_at: now,
            ready_at: start
                .saturating_add(self.config.base_latency)
                .saturating_add(service),
        };
        self.busy_until = ticket.ready_at;
        self.inflight.push_back((request.payload, ticket));
        Ok(ticket)
    }

    /// Hand every request finished by `now` to `done`, oldest first.
    pub fn service_ready<F>(&mut self, now: Cycle, mut done: F)
    where
        F: FnMut(T, Ticket),
    {
        while self.inflight.front().is_some_and(|(_, t)| t.ready_at <= now) {
            if let Some((payload, ticket)) = self.inflight.pop_front() {
                done(payload, ticket);
            }
        }
    }

    pub fn outstanding(&self) -> usize {
        self.inflight.len()
    }

    pub fn clear(&mut self) {
        self.inflight.clear();
        self.busy_until = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_and_bandwidth_set_ready_cycle() {
        let mut server = TimedServer::new(ServerConfig {
            base_latency: 3,
            bytes_per_cycle: 4,
            queue_capacity: 2,
        });
        let ticket = server.try_enqueue(10, ServiceRequest::new(1u32, 16)).unwrap();
        assert_eq!(ticket.issued_at(), 10);
        assert_eq!(ticket.ready_at(), 17);
        // the second request queues behind the first
        let ticket = server.try_enqueue(10, ServiceRequest::new(2u32, 4)).unwrap();
        assert_eq!(ticket.ready_at(), 21);
    }

    #[test]
    fn full_queue_returns_request() {
        let mut server = TimedServer::new(ServerConfig {
            base_latency: 1,
            bytes_per_cycle: 1,
            queue_capacity: 1,
        });
        server.try_enqueue(0, ServiceRequest::new(1u32, 1)).unwrap();
        let err = server.try_enqueue(0, ServiceRequest::new(2u32, 1)).unwrap_err();
        assert_eq!(err.capacity, 1);
        assert_eq!(err.into_request().payload, 2);
    }

    #[test]
    fn service_ready_drains_in_order() {
        let mut server = TimedServer::new(ServerConfig {
            base_latency: 0,
            bytes_per_cycle: 8,
            queue_capacity: 4,
        });
        server.try_enqueue(0, ServiceRequest::new(1u32, 8)).unwrap();
        server.try_enqueue(0, ServiceRequest::new(2u32, 8)).unwrap();
        let mut seen = Vec::new();
        server.service_ready(1, |p, _| seen.push(p));
        assert_eq!(seen, vec![1]);
        server.service_ready(2, |p, _| seen.push(p));
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(server.outstanding(), 0);
    }
}
