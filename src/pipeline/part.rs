use crate::bytecode::module::{BuiltIn, ExecutionModel, Id, Program, StorageClass, Type};
use crate::bytecode::parser::parse;
use crate::foundation::error::{GpuError, GpuResult};
use crate::runtime::types::TypeTable;

/// Pipeline stage a shader part runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Interface variable as seen by reflection.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct InterfaceVariable {
    pub id: Id,
    pub name: Option<String>,
    pub location: Option<u32>,
    /// Built-in decoration, on the variable itself or on a member of its block.
    pub builtin: Option<String>,
    pub size: usize,
}

/// A uniform block or texture binding.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ResourceBinding {
    pub id: Id,
    pub name: Option<String>,
    pub set: u32,
    pub binding: u32,
    pub size: usize,
}

/// Reflection metadata of one compiled stage.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Reflection {
    pub stage: ShaderStage,
    pub entry_point: String,
    pub inputs: Vec<InterfaceVariable>,
    pub outputs: Vec<InterfaceVariable>,
    pub uniforms: Vec<ResourceBinding>,
    pub textures: Vec<ResourceBinding>,
    pub instruction_count: usize,
}

impl Reflection {
    pub fn input_at(&self, location: u32) -> Option<&InterfaceVariable> {
        self.inputs.iter().find(|v| v.location == Some(location))
    }

    pub fn output_at(&self, location: u32) -> Option<&InterfaceVariable> {
        self.outputs.iter().find(|v| v.location == Some(location))
    }
}

/// A parsed, reflected and laid-out shader stage, ready to be linked.
#[derive(Debug, Clone)]
pub struct ShaderPart {
    program: Program,
    types: TypeTable,
    entry: Id,
    reflection: Reflection,
    hash: u64,
}

impl ShaderPart {
    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn stage(&self) -> ShaderStage {
        self.reflection.stage
    }

    /// Function id of the entry point.
    pub fn entry(&self) -> Id {
        self.entry
    }

    pub fn reflection(&self) -> &Reflection {
        &self.reflection
    }

    /// xxh3 hash of the bytecode this part was compiled from.
    pub fn hash(&self) -> u64 {
        self.hash
    }
}

/// Parse, validate and reflect one stage's bytecode.
#[tracing::instrument(skip(bytecode), fields(bytes = bytecode.len()))]
pub fn compile(bytecode: &[u8]) -> GpuResult<ShaderPart> {
    let program = parse(bytecode)?;
    let types = TypeTable::build(&program)?;

    let ep = match program.entry_points.as_slice() {
        [ep] => ep,
        [] => return Err(GpuError::validation("module has no entry point")),
        many => {
            return Err(GpuError::validation(format!(
                "module has {} entry points, expected one",
                many.len()
            )));
        }
    };
    let stage = match ep.model {
        ExecutionModel::Vertex => ShaderStage::Vertex,
        ExecutionModel::Fragment => ShaderStage::Fragment,
        other => {
            return Err(GpuError::validation(format!(
                "unsupported execution model {other:?}"
            )));
        }
    };

    let reflection = Reflection {
        stage,
        entry_point: ep.name.clone(),
        inputs: interface(&program, &types, StorageClass::Input)?,
        outputs: interface(&program, &types, StorageClass::Output)?,
        uniforms: resources(&program, &types, StorageClass::Uniform)?,
        textures: resources(&program, &types, StorageClass::UniformConstant)?,
        instruction_count: program.function(ep.function)?.body.len(),
    };
    tracing::debug!(
        stage = ?reflection.stage,
        inputs = reflection.inputs.len(),
        outputs = reflection.outputs.len(),
        uniforms = reflection.uniforms.len(),
        textures = reflection.textures.len(),
        instructions = reflection.instruction_count,
        "compiled shader part"
    );

    Ok(ShaderPart {
        entry: ep.function,
        program,
        types,
        reflection,
        hash: xxhash_rust::xxh3::xxh3_64(bytecode),
    })
}

/// Built-in decoration of variable `id`, or the `Position` member of its block type.
pub(crate) fn builtin_of(program: &Program, id: Id) -> GpuResult<Option<(BuiltIn, Option<u32>)>> {
    if let Some(b) = program.decorations(id).builtin {
        return Ok(Some((b, None)));
    }
    let var = program
        .variables
        .get(&id)
        .ok_or_else(|| GpuError::validation(format!("%{id} is not a global variable")))?;
    let (_, pointee) = program.pointee(var.ty)?;
    if let Type::Struct { members } = program.ty(pointee)? {
        for member in 0..members.len() as u32 {
            if program.member_decorations(pointee, member).builtin == Some(BuiltIn::Position) {
                return Ok(Some((BuiltIn::Position, Some(member))));
            }
        }
    }
    Ok(None)
}

fn pointee_size(program: &Program, types: &TypeTable, var_ty: Id) -> GpuResult<usize> {
    let (_, pointee) = program.pointee(var_ty)?;
    types.size(pointee)
}

fn interface(
    program: &Program,
    types: &TypeTable,
    storage: StorageClass,
) -> GpuResult<Vec<InterfaceVariable>> {
    program
        .variables_in(storage)
        .map(|(id, var)| {
            Ok(InterfaceVariable {
                id,
                name: program.name(id).map(str::to_owned),
                location: program.decorations(id).location,
                builtin: builtin_of(program, id)?.map(|(b, _)| format!("{b:?}")),
                size: pointee_size(program, types, var.ty)?,
            })
        })
        .collect()
}

fn resources(
    program: &Program,
    types: &TypeTable,
    storage: StorageClass,
) -> GpuResult<Vec<ResourceBinding>> {
    program
        .variables_in(storage)
        .map(|(id, var)| {
            let deco = program.decorations(id);
            let binding = deco.binding.ok_or_else(|| {
                GpuError::validation(format!("{storage:?} variable %{id} has no binding"))
            })?;
            Ok(ResourceBinding {
                id,
                name: program.name(id).map(str::to_owned),
                set: deco.set.unwrap_or(0),
                binding,
                size: pointee_size(program, types, var.ty)?,
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/part.rs"]
mod tests;
