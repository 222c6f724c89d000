use super::*;
use crate::bytecode::emit::ModuleBuilder;
use crate::bytecode::module::StorageClass;
use crate::bytecode::parser::parse;

const VEC4: RuntimeType = RuntimeType::Vector {
    elem: Scalar::F32,
    count: 4,
};

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn f32s(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[test]
fn sizes_follow_natural_layout() {
    let f = RuntimeType::Scalar(Scalar::F32);
    assert_eq!(f.size(), 4);
    assert_eq!(f.vectorize(3).unwrap().size(), 12);
    assert_eq!(f.matrixize(4, 4).unwrap().size(), 64);
    let s = RuntimeType::Struct {
        fields: vec![VEC4, f.clone(), RuntimeType::SampledImage],
    };
    assert_eq!(s.size(), 16 + 4 + HANDLE_BYTES);
    assert_eq!(s.member_offset(1), Some(16));
    assert_eq!(s.member_offset(2), Some(20));
    assert_eq!(s.member_offset(3), None);
    let ptr = RuntimeType::Pointer {
        pointee: Box::new(s),
    };
    assert_eq!(ptr.size(), 0);
}

#[test]
fn vectorize_and_matrixize_reject_invalid_shapes() {
    let f = RuntimeType::Scalar(Scalar::F32);
    assert!(f.vectorize(5).is_err());
    assert!(VEC4.vectorize(2).is_err());
    assert!(RuntimeType::Scalar(Scalar::U32).matrixize(2, 2).is_err());
    assert!(f.matrixize(1, 4).is_err());
}

#[test]
fn matrix_members_are_columns() {
    let m = RuntimeType::Scalar(Scalar::F32).matrixize(3, 2).unwrap();
    assert_eq!(m.member_offset(1), Some(12));
    assert_eq!(
        m.member_type(0),
        Some(RuntimeType::Vector {
            elem: Scalar::F32,
            count: 3
        })
    );
    assert_eq!(m.member_offset(2), None);
}

#[test]
fn scalar_round_trips_and_saturates() {
    let mut buf = [0u8; 8];
    let i16s = Scalar {
        kind: ScalarKind::SInt,
        bytes: 2,
    };
    i16s.write(&mut buf, -3.4);
    assert_eq!(i16s.read(&buf), -3.0);
    i16s.write(&mut buf, 1e9);
    assert_eq!(i16s.read(&buf), f64::from(i16::MAX));

    let i8s = Scalar {
        kind: ScalarKind::SInt,
        bytes: 1,
    };
    i8s.write(&mut buf, 300.0);
    assert_eq!(i8s.read(&buf), 127.0);
    i8s.write(&mut buf, -300.0);
    assert_eq!(i8s.read(&buf), -128.0);

    let u8s = Scalar {
        kind: ScalarKind::UInt,
        bytes: 1,
    };
    u8s.write(&mut buf, 300.0);
    assert_eq!(u8s.read(&buf), 255.0);
    u8s.write(&mut buf, -1.0);
    assert_eq!(u8s.read(&buf), 0.0);

    Scalar::BOOL.write(&mut buf, 5.0);
    assert_eq!(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]), 1);
}

#[test]
fn interpolation_at_a_corner_is_bit_exact() {
    let a = f32_bytes(&[0.1, 0.2, 0.3, f32::MAX]);
    let b = f32_bytes(&[7.0, 8.0, 9.0, 10.0]);
    let c = f32_bytes(&[-1.0, -2.0, -3.0, -4.0]);
    let mut out = vec![0u8; 16];
    VEC4
        .interpolate_bytes([1.0, 0.0, 0.0], [&a, &b, &c], &mut out)
        .unwrap();
    assert_eq!(out, a);
    VEC4
        .interpolate_bytes([0.0, 0.0, 1.0], [&a, &b, &c], &mut out)
        .unwrap();
    assert_eq!(out, c);
}

#[test]
fn interpolation_at_the_centroid_is_the_mean() {
    let third = 1.0f32 / 3.0;
    let same = f32_bytes(&[0.25, 0.5, 0.75, 1.0]);
    let mut out = vec![0u8; 16];
    VEC4
        .interpolate_bytes([third; 3], [&same, &same, &same], &mut out)
        .unwrap();
    for (got, want) in f32s(&out).iter().zip([0.25f32, 0.5, 0.75, 1.0]) {
        assert!((got - want).abs() <= 1e-6, "{got} vs {want}");
    }

    let a = f32_bytes(&[0.0, 3.0, 0.0, 0.0]);
    let b = f32_bytes(&[3.0, 0.0, 0.0, 0.0]);
    let c = f32_bytes(&[0.0, 0.0, 3.0, 0.0]);
    VEC4
        .interpolate_bytes([third; 3], [&a, &b, &c], &mut out)
        .unwrap();
    for v in &f32s(&out)[..3] {
        assert!((v - 1.0).abs() <= 1e-6);
    }
}

#[test]
fn struct_interpolation_recurses_into_fields() {
    let ty = RuntimeType::Struct {
        fields: vec![
            RuntimeType::Scalar(Scalar::F32),
            RuntimeType::Scalar(Scalar::F32).vectorize(2).unwrap(),
        ],
    };
    let a = f32_bytes(&[0.0, 0.0, 0.0]);
    let b = f32_bytes(&[2.0, 4.0, 8.0]);
    let mut out = vec![0u8; ty.size()];
    ty.interpolate_bytes([0.5, 0.5, 0.0], [&a, &b, &a], &mut out)
        .unwrap();
    assert_eq!(f32s(&out), vec![1.0, 2.0, 4.0]);
}

#[test]
fn handles_are_not_interpolatable() {
    assert!(!RuntimeType::SampledImage.is_interpolatable());
    let s = RuntimeType::Struct {
        fields: vec![VEC4, RuntimeType::Image],
    };
    assert!(!s.is_interpolatable());
    assert!(VEC4.is_interpolatable());

    let h = [0u8; HANDLE_BYTES];
    let mut out = [0u8; HANDLE_BYTES];
    assert!(
        RuntimeType::SampledImage
            .interpolate_bytes([0.5, 0.25, 0.25], [&h, &h, &h], &mut out)
            .is_err()
    );
}

#[test]
fn matrix_times_vector_is_column_major() {
    let m = RuntimeType::Scalar(Scalar::F32).matrixize(2, 2).unwrap();
    // Columns (1, 3) and (2, 4): the matrix [[1, 2], [3, 4]].
    let mat = f32_bytes(&[1.0, 3.0, 2.0, 4.0]);
    let v = f32_bytes(&[5.0, 6.0]);
    let mut out = vec![0u8; 8];
    m.matrix_times_vector(&mat, &v, &mut out).unwrap();
    assert_eq!(f32s(&out), vec![17.0, 39.0]);
}

#[test]
fn matrix_times_matrix_checks_dimensions() {
    let m2 = RuntimeType::Scalar(Scalar::F32).matrixize(2, 2).unwrap();
    let a = f32_bytes(&[1.0, 3.0, 2.0, 4.0]);
    let identity = f32_bytes(&[1.0, 0.0, 0.0, 1.0]);
    let mut out = vec![0u8; 16];
    m2.matrix_times_matrix(&m2, &a, &identity, &mut out).unwrap();
    assert_eq!(out, a);

    let m3x2 = RuntimeType::Scalar(Scalar::F32).matrixize(3, 3).unwrap();
    assert!(m2.matrix_times_matrix(&m3x2, &a, &a, &mut out).is_err());
}

#[test]
fn read_value_boxes_nested_data() {
    let ty = RuntimeType::Struct {
        fields: vec![VEC4, RuntimeType::SampledImage],
    };
    let mut bytes = f32_bytes(&[1.0, 2.0, 3.0, 4.0]);
    bytes.extend(2u32.to_le_bytes());
    bytes.extend(5u32.to_le_bytes());
    let value = ty.read_value(&bytes).unwrap();
    assert_eq!(value.flatten(), vec![1.0, 2.0, 3.0, 4.0]);
    match value {
        Value::Composite(fields) => {
            assert_eq!(fields[1], Value::Handle { set: 2, binding: 5 });
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(ty.read_value(&bytes[..8]).is_err());
}

#[test]
fn type_table_mirrors_declared_types() {
    let mut b = ModuleBuilder::new();
    let float = b.type_float(32);
    let uint = b.type_int(32, false);
    let vec3 = b.type_vector(float, 3);
    let mat = b.type_matrix(vec3, 4);
    let three = b.constant_u32(uint, 3);
    let arr = b.type_array(vec3, three);
    let block = b.type_struct(&[mat, arr, float]);
    let ptr = b.type_pointer(StorageClass::Uniform, block);
    let program = parse(&b.to_bytes()).unwrap();
    let table = TypeTable::build(&program).unwrap();

    assert_eq!(table.size(vec3).unwrap(), 12);
    assert_eq!(table.size(mat).unwrap(), 48);
    assert_eq!(table.size(arr).unwrap(), 36);
    assert_eq!(table.size(block).unwrap(), 48 + 36 + 4);
    assert_eq!(table.size(ptr).unwrap(), 0);

    assert_eq!(table.element(block, 1).unwrap(), (48, arr));
    assert_eq!(table.element(block, 2).unwrap(), (84, float));
    assert_eq!(table.element(arr, 2).unwrap(), (24, vec3));
    assert_eq!(table.element(mat, 3).unwrap(), (36, vec3));
    assert!(table.element(block, 3).is_err());
    assert!(table.element(float, 0).is_err());
}
