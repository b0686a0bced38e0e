use crate::xbar::types::{ChannelKind, Resp, WriteResp};

use super::support::{config, Bench, WINDOW};

#[test]
fn fifth_write_waits_for_first_completion() {
    let mut bench = Bench::new(config(1, 1));
    for k in 0..5 {
        bench.drivers[0].write(k, 0x10 * k as u64, 0);
    }
    bench.run(20);
    assert_eq!(bench.targets[0].aw.len(), 4);
    assert_eq!(bench.targets[0].w.len(), 4);
    assert_eq!(bench.xbar.outstanding(0, 0), 4);
    assert!(bench.drivers[0].handle.aw_pending());
    assert!(bench.xbar.stats().initiators[0].tracker_stalls() > 0);

    let first = bench.targets[0].aw[0].id;
    bench.targets[0].respond_b(first, Resp::Okay);
    bench.run(4);
    assert_eq!(
        bench.drivers[0].b,
        vec![WriteResp {
            id: 0,
            resp: Resp::Okay
        }]
    );
    assert_eq!(bench.targets[0].aw.len(), 5);
    assert_eq!(bench.xbar.outstanding(0, 0), 4);
    assert_eq!(bench.xbar.peak_outstanding(0, 0), 4);
}

#[test]
fn higher_priority_wins_the_target() {
    let mut cfg = config(2, 1);
    cfg.initiators[0].priority = 0;
    cfg.initiators[1].priority = 3;
    let mut bench = Bench::new(cfg);
    bench.drivers[0].read(1, 0x10, 0);
    bench.drivers[1].read(1, 0x20, 0);
    bench.run(4);
    let ar = &bench.targets[0].ar;
    assert_eq!(ar.len(), 2);
    assert_eq!(ar[0].id, 0x201);
    assert_eq!(ar[1].id, 0x101);
    assert_eq!(bench.xbar.stats().initiators[0].arbitration_losses(), 1);
}

#[test]
fn equal_priorities_share_the_target_fairly() {
    let mut cfg = config(3, 1);
    cfg.targets[0].outstanding = 16;
    for ini in &mut cfg.initiators {
        ini.outstanding = 16;
    }
    let mut bench = Bench::new(cfg);
    for driver in &mut bench.drivers {
        for k in 0..12 {
            driver.read(0, 8 * k, 0);
        }
    }
    bench.run(60);
    let owners: Vec<u32> = bench.targets[0].ar.iter().map(|req| req.id >> 8).collect();
    assert_eq!(owners.len(), 36);
    for window in owners.windows(3) {
        let mut seen = window.to_vec();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 3, "window {window:?} in {owners:?}");
    }
}

#[test]
fn range_boundaries_decode_to_target() {
    let mut bench = Bench::new(config(1, 2));
    bench.drivers[0].read(1, 0, 0);
    bench.drivers[0].read(2, WINDOW - 1, 0);
    bench.drivers[0].read(3, WINDOW, 0);
    bench.drivers[0].read(4, 2 * WINDOW - 1, 0);
    bench.run(10);
    let t0: Vec<u64> = bench.targets[0].ar.iter().map(|r| r.addr).collect();
    let t1: Vec<u64> = bench.targets[1].ar.iter().map(|r| r.addr).collect();
    assert_eq!(t0, vec![0, WINDOW - 1]);
    assert_eq!(t1, vec![WINDOW, 2 * WINDOW - 1]);
}

#[test]
fn unmapped_read_gets_decerr_without_a_slot() {
    let mut bench = Bench::new(config(1, 2));
    bench.drivers[0].read(6, 2 * WINDOW, 3);
    for _ in 0..10 {
        bench.cycle();
        assert_eq!(bench.xbar.outstanding(0, 0) + bench.xbar.outstanding(0, 1), 0);
    }
    let beats = &bench.drivers[0].r;
    assert_eq!(beats.len(), 4);
    assert!(beats.iter().all(|b| b.id == 6 && b.resp == Resp::DecErr));
    let lasts: Vec<bool> = beats.iter().map(|b| b.last).collect();
    assert_eq!(lasts, vec![false, false, false, true]);
    assert!(bench.targets.iter().all(|t| t.ar.is_empty()));
    assert_eq!(bench.xbar.stats().initiators[0].decode_errors(), 1);
}

#[test]
fn unmapped_write_absorbs_data_before_decerr() {
    let mut bench = Bench::new(config(1, 1));
    bench.drivers[0].aw.push_back(crate::xbar::types::AddrRequest::new(2, 0x8000, 1));
    bench.run(6);
    assert!(bench.drivers[0].b.is_empty());
    bench.drivers[0].data(0x8000, 1);
    bench.run(6);
    assert_eq!(
        bench.drivers[0].b,
        vec![WriteResp {
            id: 2,
            resp: Resp::DecErr
        }]
    );
    assert!(bench.targets[0].w.is_empty());
    assert!(bench.xbar.is_idle());
}

#[test]
fn read_only_initiator_write_is_decode_error() {
    let mut cfg = config(1, 1);
    cfg.initiators[0].mode = crate::xbar::config::Capability::ReadOnly;
    let mut bench = Bench::new(cfg);
    bench.drivers[0].write(1, 0x10, 0);
    bench.run(8);
    assert_eq!(bench.drivers[0].b[0].resp, Resp::DecErr);
    assert!(bench.targets[0].aw.is_empty());
}

#[test]
fn tracker_matches_live_transactions_under_load() {
    let mut cfg = config(3, 2);
    for ini in &mut cfg.initiators {
        ini.outstanding = 2;
    }
    let mut bench = Bench::new(cfg);
    bench.targets.iter_mut().for_each(|t| t.auto = true);
    for (i, driver) in bench.drivers.iter_mut().enumerate() {
        for k in 0..20u64 {
            let addr = ((k + i as u64) % 2) * WINDOW + 8 * k;
            let id = (k % 4) as u32;
            let len = (k % 4) as u8;
            if k % 3 == 0 {
                driver.write(id, addr, len);
            } else {
                driver.read(id, addr, len);
            }
        }
    }
    for _ in 0..600 {
        bench.cycle();
        for i in 0..3 {
            for t in 0..2 {
                let live = bench.xbar.live_transactions(i, t);
                assert_eq!(bench.xbar.outstanding(i, t), live);
                assert!(live <= bench.xbar.outstanding_depth(i, t));
            }
        }
    }
    for driver in &bench.drivers {
        let reads = driver.r.iter().filter(|b| b.last).count();
        assert_eq!(driver.b.len() + reads, 20);
        assert!(driver.b.iter().all(|b| b.resp == Resp::Okay));
    }
    assert!(bench.xbar.is_idle());
    let totals = bench.xbar.stats().initiator_totals();
    assert_eq!(totals.completed(ChannelKind::Write) + totals.completed(ChannelKind::Read), 60);
}
