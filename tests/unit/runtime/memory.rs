use super::*;

#[test]
fn alloc_bumps_and_records() {
    let mut mem = ShaderMemory::with_limit(64);
    let a = mem.alloc(1, 16).unwrap();
    let b = mem.alloc(2, 4).unwrap();
    assert_eq!((a.addr, b.addr), (0, 16));
    assert_eq!(mem.stack_pointer(), 20);
    assert_eq!(mem.available(), 44);
    assert_eq!(mem.records(), &[a, b]);
    assert_eq!(mem.record_at(16), Some(&b));
    assert_eq!(mem.record_at(8), None);
}

#[test]
fn exhaustion_is_reported_not_wrapped() {
    let mut mem = ShaderMemory::with_limit(24);
    mem.alloc(1, 16).unwrap();
    match mem.alloc(1, 16) {
        Err(GpuError::ArenaExhausted {
            requested,
            available,
        }) => assert_eq!((requested, available), (16, 8)),
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(mem.stack_pointer(), 16);
}

#[test]
fn reset_to_mark_releases_and_rezeroes() {
    let mut mem = ShaderMemory::with_limit(32);
    mem.alloc(1, 8).unwrap();
    let mark = mem.mark();
    let tmp = mem.alloc(2, 8).unwrap();
    mem.write(tmp.addr, &[0xff; 8]).unwrap();

    mem.reset_to(mark);
    assert_eq!(mem.stack_pointer(), 8);
    assert_eq!(mem.records().len(), 1);
    assert!(mem.slice(tmp.addr, 8).is_err());

    let again = mem.alloc(3, 8).unwrap();
    assert_eq!(again.addr, tmp.addr);
    assert_eq!(mem.slice(again.addr, 8).unwrap(), &[0u8; 8]);
}

#[test]
fn access_outside_live_region_fails() {
    let mut mem = ShaderMemory::with_limit(16);
    let v = mem.alloc(1, 4).unwrap();
    assert!(mem.slice(v.addr, 8).is_err());
    assert!(mem.write(2, &[1, 2, 3]).is_err());
    assert!(mem.copy(0, usize::MAX, 1).is_err());
}

#[test]
fn copy_and_read_back() {
    let mut mem = ShaderMemory::with_limit(16);
    let a = mem.alloc(1, 4).unwrap();
    let b = mem.alloc(1, 4).unwrap();
    mem.write(a.addr, &7u32.to_le_bytes()).unwrap();
    mem.copy(a.addr, b.addr, 4).unwrap();
    assert_eq!(mem.read_u32(b.addr).unwrap(), 7);
}

#[test]
fn limit_cannot_drop_below_stack_pointer() {
    let mut mem = ShaderMemory::with_limit(1 << 10);
    mem.alloc(1, 100).unwrap();
    assert!(mem.set_limit(64).is_err());
    mem.set_limit(100).unwrap();
    assert_eq!(mem.available(), 0);
    assert!(mem.alloc(1, 1).is_err());
}

#[test]
fn clones_are_independent_images() {
    let mut image = ShaderMemory::with_limit(8);
    let v = image.alloc(1, 4).unwrap();
    image.write(v.addr, &[1, 2, 3, 4]).unwrap();

    let mut draw = image.clone();
    draw.write(v.addr, &[9, 9, 9, 9]).unwrap();
    draw.clone_from(&image);
    assert_eq!(draw.slice(v.addr, 4).unwrap(), &[1, 2, 3, 4]);
}
