use super::*;

#[test]
fn upload_writes_at_offset_and_rejects_overflow() {
    let mut buf = CpuBuffer::new(8, BufferUsage::Uniform);
    assert_eq!(buf.len(), 8);
    assert!(!buf.is_empty());
    buf.upload(&[1, 2, 3], 4).unwrap();
    assert_eq!(buf.contents(), &[0, 0, 0, 0, 1, 2, 3, 0]);

    let err = buf.upload(&[0; 4], 6).unwrap_err();
    assert!(matches!(err, GpuError::Validation(_)));
    assert!(buf.upload(&[0], usize::MAX).is_err());
}

#[test]
fn mapping_writes_through() {
    let mut buf = CpuBuffer::from_u16s(&[1, 2], BufferUsage::Index);
    assert_eq!(buf.usage(), BufferUsage::Index);
    {
        let mut map = buf.map();
        map[0] = 7;
        assert_eq!(map.len(), 4);
    }
    assert_eq!(buf.contents(), &[7, 0, 2, 0]);
}

#[test]
fn typed_constructors_pack_little_endian() {
    let floats = CpuBuffer::from_f32s(&[1.0], BufferUsage::Vertex);
    assert_eq!(floats.contents(), &1.0f32.to_le_bytes());
    let ints = CpuBuffer::from_u32s(&[0x0102_0304], BufferUsage::Index);
    assert_eq!(ints.contents(), &[4, 3, 2, 1]);
}
