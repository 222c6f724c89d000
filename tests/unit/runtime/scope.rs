use super::*;
use crate::bytecode::emit::ModuleBuilder;
use crate::bytecode::module::StorageClass;
use crate::bytecode::parser::parse;

struct Fixture {
    program: Program,
    types: TypeTable,
    color: Id,
    half: Id,
    out: Id,
    private: Id,
}

fn fixture() -> Fixture {
    let mut b = ModuleBuilder::new();
    let float = b.type_float(32);
    let vec4 = b.type_vector(float, 4);
    let half = b.constant_f32(float, 0.5);
    let one = b.constant_f32(float, 1.0);
    let color = b.constant_composite(vec4, &[half, one, half, one]);
    let ptr_out = b.type_pointer(StorageClass::Output, vec4);
    let ptr_private = b.type_pointer(StorageClass::Private, float);
    let out = b.variable(ptr_out, StorageClass::Output);
    let private = b.variable_with_initializer(ptr_private, StorageClass::Private, one);
    let program = parse(&b.to_bytes()).unwrap();
    let types = TypeTable::build(&program).unwrap();
    Fixture {
        program,
        types,
        color,
        half,
        out,
        private,
    }
}

fn f32_at(memory: &ShaderMemory, addr: usize) -> f32 {
    f32::from_bits(memory.read_u32(addr).unwrap())
}

#[test]
fn constants_are_materialised_in_the_arena() {
    let f = fixture();
    let mut memory = ShaderMemory::with_limit(256);
    let mut globals = Globals::new(f.program.bound);
    globals
        .bind_constants(&f.program, &f.types, &mut memory)
        .unwrap();

    let Some(Slot::Value(half)) = globals.get(f.half) else {
        panic!("constant not bound");
    };
    assert_eq!(f32_at(&memory, half.addr), 0.5);

    let Some(Slot::Value(color)) = globals.get(f.color) else {
        panic!("composite not bound");
    };
    assert_eq!(color.size, 16);
    let lanes: Vec<f32> = (0..4).map(|i| f32_at(&memory, color.addr + i * 4)).collect();
    assert_eq!(lanes, vec![0.5, 1.0, 0.5, 1.0]);
}

#[test]
fn variables_get_storage_and_initialisers() {
    let f = fixture();
    let mut memory = ShaderMemory::with_limit(256);
    let mut globals = Globals::new(f.program.bound);
    let out = globals
        .allocate_variable(&f.program, &f.types, &mut memory, f.out)
        .unwrap();
    assert_eq!(out.size, 16);
    let private = globals
        .allocate_variable(&f.program, &f.types, &mut memory, f.private)
        .unwrap();
    assert_eq!(f32_at(&memory, private.addr), 1.0);
    assert!(matches!(
        globals.get(f.out),
        Some(Slot::Pointer { addr: 0, .. })
    ));
    assert!(
        globals
            .allocate_variable(&f.program, &f.types, &mut memory, f.half)
            .is_err()
    );
}

#[test]
fn scope_applies_interface_overrides() {
    let f = fixture();
    let mut globals = Globals::new(f.program.bound);
    globals.bind_variable(&f.program, f.out, 64).unwrap();
    globals
        .bind(f.half, Slot::Value(VarInfo {
            addr: 0,
            size: 4,
            ty: 0,
        }))
        .unwrap();

    let mut bindings = InterfaceBindings::new();
    bindings.retarget(f.out, 96);
    bindings.retarget(f.out, 128);
    assert_eq!(bindings.iter().count(), 1);

    let scope = Scope::new(&globals, &bindings).unwrap();
    assert_eq!(scope.pointer(f.out).unwrap().0, 128);
    assert!(scope.value(f.out).is_err());
    assert!(scope.pointer(f.half).is_err());
    assert!(scope.slot(f.private).is_err());

    let plain = Scope::new(&globals, &InterfaceBindings::new()).unwrap();
    assert_eq!(plain.pointer(f.out).unwrap().0, 64);

    let mut bad = InterfaceBindings::new();
    bad.retarget(f.half, 0);
    assert!(Scope::new(&globals, &bad).is_err());
}
