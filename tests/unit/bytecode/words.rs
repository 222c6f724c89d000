use super::*;

fn to_bytes(words: &[Word]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

#[test]
fn rejects_bad_magic_and_odd_lengths() {
    assert!(words_from_bytes(&[]).is_err());
    assert!(words_from_bytes(&[1, 2, 3]).is_err());
    let err = words_from_bytes(&to_bytes(&[0xdead_beef])).unwrap_err();
    assert!(err.to_string().contains("bad magic"));
}

#[test]
fn big_endian_modules_are_normalized() {
    let bytes: Vec<u8> = [spirv::MAGIC_NUMBER, 0x0001_0000]
        .iter()
        .flat_map(|w| w.to_be_bytes())
        .collect();
    let words = words_from_bytes(&bytes).unwrap();
    assert_eq!(words, vec![spirv::MAGIC_NUMBER, 0x0001_0000]);
}

#[test]
fn iterator_splits_on_word_count() {
    let words = [(2 << 16) | 17, 1, (3 << 16) | 14, 0, 1];
    let insts: Vec<_> = InstructionIter::new(&words, 0)
        .collect::<GpuResult<Vec<_>>>()
        .unwrap();
    assert_eq!(insts.len(), 2);
    assert_eq!(insts[0].opcode, 17);
    assert_eq!(insts[0].operands, &[1]);
    assert_eq!(insts[1].operands, &[0, 1]);
}

#[test]
fn iterator_reports_truncation_and_zero_count() {
    let truncated = [(4 << 16) | 17, 1];
    let mut it = InstructionIter::new(&truncated, 0);
    assert!(it.next().unwrap().is_err());
    assert!(it.next().is_none());

    let zero = [17u32];
    let mut it = InstructionIter::new(&zero, 0);
    assert!(it.next().unwrap().is_err());
}

#[test]
fn strings_round_trip_and_trailing_words_are_rejected() {
    for s in ["", "main", "GLSL.std.450", "abcd"] {
        let encoded = encode_string(s);
        assert_eq!(encoded.len(), s.len() / 4 + 1);
        let mut ops = Operands::new(spirv::Op::Name, &encoded);
        assert_eq!(ops.string().unwrap(), s);
        ops.finish().unwrap();
    }

    let words = [7, 8];
    let mut ops = Operands::new(spirv::Op::TypeVoid, &words);
    ops.id().unwrap();
    let err = ops.finish().unwrap_err();
    assert!(err.to_string().contains("trailing"));
}
