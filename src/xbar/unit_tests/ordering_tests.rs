use crate::xbar::error::XbarError;
use crate::xbar::types::{AddrRequest, Resp, WriteBeat};

use super::support::{config, Bench, WINDOW};

#[test]
fn same_id_to_another_target_waits_for_the_first() {
    let mut bench = Bench::new(config(1, 2));
    bench.drivers[0].read(1, 0x10, 0);
    bench.drivers[0].read(1, WINDOW + 0x10, 0);
    bench.run(10);
    assert_eq!(bench.targets[0].ar.len(), 1);
    assert!(bench.targets[1].ar.is_empty());
    assert!(bench.xbar.stats().initiators[0].order_stalls() > 0);

    let req = bench.targets[0].ar[0];
    bench.targets[0].respond_r(&req, Resp::Okay);
    bench.run(5);
    assert_eq!(bench.drivers[0].r.len(), 1);
    assert_eq!(bench.targets[1].ar.len(), 1);

    let req = bench.targets[1].ar[0];
    bench.targets[1].respond_r(&req, Resp::Okay);
    bench.run(5);
    let data: Vec<u64> = bench.drivers[0].r.iter().map(|b| b.data).collect();
    assert_eq!(data, vec![0x10, WINDOW + 0x10]);
}

#[test]
fn different_ids_complete_out_of_order() {
    let mut bench = Bench::new(config(1, 1));
    bench.drivers[0].read(1, 0x10, 0);
    bench.drivers[0].read(2, 0x20, 0);
    bench.run(6);
    let (first, second) = (bench.targets[0].ar[0], bench.targets[0].ar[1]);
    bench.targets[0].respond_r(&second, Resp::Okay);
    bench.targets[0].respond_r(&first, Resp::Okay);
    bench.run(6);
    let ids: Vec<u32> = bench.drivers[0].r.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![2, 1]);
}

#[test]
fn read_bursts_of_different_ids_interleave() {
    let mut bench = Bench::new(config(1, 2));
    bench.drivers[0].read(1, 0x10, 3);
    bench.drivers[0].read(2, WINDOW, 3);
    bench.run(6);
    for t in 0..2 {
        let req = bench.targets[t].ar[0];
        bench.targets[t].respond_r(&req, Resp::Okay);
    }
    bench.run(12);
    let ids: Vec<u32> = bench.drivers[0].r.iter().map(|b| b.id).collect();
    assert_eq!(ids.len(), 8);
    // beat order within each id is preserved
    for id in [1, 2] {
        let lasts: Vec<bool> = bench.drivers[0]
            .r
            .iter()
            .filter(|b| b.id == id)
            .map(|b| b.last)
            .collect();
        assert_eq!(lasts, vec![false, false, false, true]);
    }
    assert!(ids.windows(2).any(|w| w[0] != w[1]));
}

#[test]
fn write_bursts_reach_target_whole_and_in_grant_order() {
    let mut bench = Bench::new(config(2, 1));
    bench.targets[0].auto = true;
    bench.drivers[0].write(1, 0x100, 1);
    bench.drivers[1].write(1, 0x200, 1);
    bench.run(12);
    let target = &bench.targets[0];
    let data: Vec<u64> = target.w.iter().map(|b| b.data).collect();
    assert_eq!(data, vec![0x100, 0x101, 0x200, 0x201]);
    assert_eq!(target.w[0].id, Some(target.aw[0].id));
    assert_eq!(target.w[3].id, Some(target.aw[1].id));
    assert_eq!(bench.drivers[0].b.len(), 1);
    assert_eq!(bench.drivers[1].b.len(), 1);
}

#[test]
fn early_last_beat_halts_the_interconnect() {
    let mut bench = Bench::new(config(1, 1));
    bench.drivers[0].aw.push_back(AddrRequest::new(1, 0, 1));
    bench.drivers[0].w.push_back(WriteBeat::new(0, true));
    bench.drivers[0].tick();
    assert_eq!(bench.xbar.step(), Ok(()));
    bench.drivers[0].tick();
    let err = bench.xbar.step().unwrap_err();
    assert!(matches!(err, XbarError::OrderingViolation { initiator: 0, .. }));
    assert_eq!(bench.xbar.step(), Err(err.clone()));
    assert_eq!(bench.xbar.halted(), Some(&err));
}

#[test]
fn beat_id_must_match_its_grant() {
    let mut bench = Bench::new(config(1, 1));
    bench.drivers[0].aw.push_back(AddrRequest::new(1, 0, 0));
    bench.drivers[0].w.push_back(WriteBeat::new(0, true).with_id(7));
    bench.drivers[0].tick();
    bench.xbar.step().unwrap();
    bench.drivers[0].tick();
    assert!(matches!(
        bench.xbar.step(),
        Err(XbarError::OrderingViolation { initiator: 0, .. })
    ));
}
