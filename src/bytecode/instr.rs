use crate::bytecode::module::Id;
use smallvec::SmallVec;

/// Component-wise float arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl FloatOp {
    pub(crate) fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => a / b,
        }
    }
}

/// The closed set of executable instructions.
///
/// Operands are result ids resolved through the invocation scope at execution time. Programs are
/// straight-line: there is no branch, loop, selection or phi instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// `Function`-storage variable.
    Variable {
        result_type: Id,
        result: Id,
        initializer: Option<Id>,
    },
    Load {
        result_type: Id,
        result: Id,
        pointer: Id,
    },
    Store {
        pointer: Id,
        object: Id,
    },
    AccessChain {
        result_type: Id,
        result: Id,
        base: Id,
        indices: SmallVec<[Id; 2]>,
    },
    CompositeConstruct {
        result_type: Id,
        result: Id,
        constituents: SmallVec<[Id; 4]>,
    },
    CompositeExtract {
        result_type: Id,
        result: Id,
        composite: Id,
        indices: SmallVec<[u32; 2]>,
    },
    VectorShuffle {
        result_type: Id,
        result: Id,
        vector_a: Id,
        vector_b: Id,
        components: SmallVec<[u32; 4]>,
    },
    FNegate {
        result_type: Id,
        result: Id,
        operand: Id,
    },
    Float {
        op: FloatOp,
        result_type: Id,
        result: Id,
        lhs: Id,
        rhs: Id,
    },
    VectorTimesScalar {
        result_type: Id,
        result: Id,
        vector: Id,
        scalar: Id,
    },
    MatrixTimesVector {
        result_type: Id,
        result: Id,
        matrix: Id,
        vector: Id,
    },
    MatrixTimesMatrix {
        result_type: Id,
        result: Id,
        lhs: Id,
        rhs: Id,
    },
    /// Nearest-neighbor sample of a sampled image (implicit or explicit LOD).
    ImageSample {
        result_type: Id,
        result: Id,
        sampled_image: Id,
        coordinate: Id,
    },
    Return,
}

impl Instruction {
    /// `(result_type, result)` for instructions that define an id.
    pub fn result(&self) -> Option<(Id, Id)> {
        match *self {
            Self::Variable {
                result_type,
                result,
                ..
            }
            | Self::Load {
                result_type,
                result,
                ..
            }
            | Self::AccessChain {
                result_type,
                result,
                ..
            }
            | Self::CompositeConstruct {
                result_type,
                result,
                ..
            }
            | Self::CompositeExtract {
                result_type,
                result,
                ..
            }
            | Self::VectorShuffle {
                result_type,
                result,
                ..
            }
            | Self::FNegate {
                result_type,
                result,
                ..
            }
            | Self::Float {
                result_type,
                result,
                ..
            }
            | Self::VectorTimesScalar {
                result_type,
                result,
                ..
            }
            | Self::MatrixTimesVector {
                result_type,
                result,
                ..
            }
            | Self::MatrixTimesMatrix {
                result_type,
                result,
                ..
            }
            | Self::ImageSample {
                result_type,
                result,
                ..
            } => Some((result_type, result)),
            Self::Store { .. } | Self::Return => None,
        }
    }

    /// Ids read by the instruction (not counting its result type).
    pub fn operand_ids(&self) -> SmallVec<[Id; 4]> {
        let mut ids = SmallVec::new();
        match self {
            Self::Variable { initializer, .. } => ids.extend(*initializer),
            Self::Load { pointer, .. } => ids.push(*pointer),
            Self::Store { pointer, object } => ids.extend([*pointer, *object]),
            Self::AccessChain { base, indices, .. } => {
                ids.push(*base);
                ids.extend(indices.iter().copied());
            }
            Self::CompositeConstruct { constituents, .. } => {
                ids.extend(constituents.iter().copied())
            }
            Self::CompositeExtract { composite, .. } => ids.push(*composite),
            Self::VectorShuffle {
                vector_a, vector_b, ..
            } => ids.extend([*vector_a, *vector_b]),
            Self::FNegate { operand, .. } => ids.push(*operand),
            Self::Float { lhs, rhs, .. } | Self::MatrixTimesMatrix { lhs, rhs, .. } => {
                ids.extend([*lhs, *rhs])
            }
            Self::VectorTimesScalar { vector, scalar, .. } => ids.extend([*vector, *scalar]),
            Self::MatrixTimesVector { matrix, vector, .. } => ids.extend([*matrix, *vector]),
            Self::ImageSample {
                sampled_image,
                coordinate,
                ..
            } => ids.extend([*sampled_image, *coordinate]),
            Self::Return => {}
        }
        ids
    }
}
