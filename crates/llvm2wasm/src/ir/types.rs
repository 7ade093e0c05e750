//! Typed module model produced by the semantic decoder.
//!
//! Values live in one append-only sequence per function: the module-level
//! values (global variables, declared functions, module constants) come first,
//! followed by the function's parameters, local constants and instruction
//! results. A [`ValueId`] is an absolute position in that sequence.

use std::fmt;

/// Index into [`Module::types`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

/// Absolute position in a function's value sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

/// Index of a basic block within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ValueId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Entry of the type table.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Void,
    Half,
    Float,
    Double,
    Label,
    Metadata,
    Integer {
        bits: u32,
    },
    Pointer {
        pointee: TypeId,
        addr_space: u32,
    },
    Array {
        element: TypeId,
        len: u64,
    },
    Vector {
        element: TypeId,
        len: u64,
    },
    Function {
        ret: TypeId,
        params: Vec<TypeId>,
        vararg: bool,
    },
    Struct {
        fields: Vec<TypeId>,
        packed: bool,
        name: Option<String>,
    },
    Opaque {
        name: Option<String>,
    },
}

impl Type {
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Half | Type::Float | Type::Double)
    }
}

/// Payload of a constant value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Null,
    Undef,
    Integer(i64),
    Float(f64),
    /// Element values by absolute id.
    Aggregate(Vec<ValueId>),
    /// STRING / CSTRING contents (CSTRING includes the trailing NUL).
    Bytes(Vec<u8>),
    /// All-zero-index address computation over `base`.
    Address(ValueId),
}

/// A typed constant, as stored in the value sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub ty: TypeId,
    pub value: ConstantValue,
}

/// Module-level global variable.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVar {
    pub name: Option<String>,
    pub ty: TypeId,
    pub is_const: bool,
    /// Initializer by absolute value id.
    pub init: Option<ValueId>,
    pub value: ValueId,
}

/// Function declared in the module, with or without a body.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredFunction {
    pub name: Option<String>,
    /// Function type (a pointer-to-function record type is unwrapped).
    pub ty: TypeId,
    pub calling_conv: u64,
    pub is_proto: bool,
    pub value: ValueId,
    /// Index into [`Module::bodies`].
    pub body: Option<usize>,
}

/// What a value in the sequence is.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    /// Index into [`Module::globals`].
    Global(usize),
    /// Index into [`Module::functions`].
    Function(usize),
    Constant(ConstantValue),
    Param(usize),
    Instruction { block: BlockId, index: usize },
}

/// One SSA value.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    /// `None` for results of opaque instructions.
    pub ty: Option<TypeId>,
    pub kind: ValueKind,
    pub name: Option<String>,
}

impl Value {
    pub fn new(ty: Option<TypeId>, kind: ValueKind) -> Self {
        Self {
            ty,
            kind,
            name: None,
        }
    }
}

/// Instruction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand {
    /// Only `None` while a forward reference waits for its producer.
    pub ty: Option<TypeId>,
    pub value: ValueId,
    /// Referenced value is produced later in the function.
    pub forward: bool,
}

/// Decoded instruction payload.
#[derive(Debug, Clone, PartialEq)]
pub enum InstrKind {
    Binop {
        opcode: u64,
        lhs: Operand,
        rhs: Operand,
        flags: Option<u64>,
    },
    Cmp {
        predicate: u64,
        lhs: Operand,
        rhs: Operand,
    },
    Alloca {
        allocated: TypeId,
        size: ValueId,
        align: u64,
    },
    Load {
        ptr: Operand,
        align: u64,
        volatile: bool,
    },
    Store {
        ptr: Operand,
        value: Operand,
        align: u64,
        volatile: bool,
    },
    Br {
        target: BlockId,
    },
    CondBr {
        if_true: BlockId,
        if_false: BlockId,
        cond: Operand,
    },
    Ret {
        value: Option<Operand>,
    },
    Call {
        callee: Operand,
        fn_ty: TypeId,
        args: Vec<Operand>,
        calling_conv: u64,
    },
    /// Allow-listed record kept with its raw operands.
    Opaque {
        code: u64,
        ops: Vec<u64>,
    },
}

impl InstrKind {
    pub fn is_terminator(&self) -> bool {
        match self {
            InstrKind::Br { .. } | InstrKind::CondBr { .. } | InstrKind::Ret { .. } => true,
            InstrKind::Opaque { code, .. } => super::codes::is_terminator(*code),
            _ => false,
        }
    }

    /// Typed operands in record order.
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            InstrKind::Binop { lhs, rhs, .. } | InstrKind::Cmp { lhs, rhs, .. } => vec![lhs, rhs],
            InstrKind::Load { ptr, .. } => vec![ptr],
            InstrKind::Store { ptr, value, .. } => vec![ptr, value],
            InstrKind::CondBr { cond, .. } => vec![cond],
            InstrKind::Ret { value } => value.iter().collect(),
            InstrKind::Call { callee, args, .. } => {
                let mut ops = vec![callee];
                ops.extend(args.iter());
                ops
            }
            InstrKind::Alloca { .. } | InstrKind::Br { .. } | InstrKind::Opaque { .. } => {
                Vec::new()
            }
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            InstrKind::Binop { lhs, rhs, .. } | InstrKind::Cmp { lhs, rhs, .. } => vec![lhs, rhs],
            InstrKind::Load { ptr, .. } => vec![ptr],
            InstrKind::Store { ptr, value, .. } => vec![ptr, value],
            InstrKind::CondBr { cond, .. } => vec![cond],
            InstrKind::Ret { value } => value.iter_mut().collect(),
            InstrKind::Call { callee, args, .. } => {
                let mut ops = vec![callee];
                ops.extend(args.iter_mut());
                ops
            }
            InstrKind::Alloca { .. } | InstrKind::Br { .. } | InstrKind::Opaque { .. } => {
                Vec::new()
            }
        }
    }
}

/// Instruction with its optional result.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub kind: InstrKind,
    pub result: Option<ValueId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicBlock {
    pub name: Option<String>,
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|i| i.kind.is_terminator())
    }
}

/// Decoded function body.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBody {
    /// Index into [`Module::functions`].
    pub function: usize,
    /// Values after the module-level prefix, starting at id `first_local`.
    pub values: Vec<Value>,
    pub first_local: u32,
    pub blocks: Vec<BasicBlock>,
}

impl FunctionBody {
    /// Look a value up in the module prefix or in this body.
    pub fn value<'a>(&'a self, module: &'a Module, id: ValueId) -> Option<&'a Value> {
        if id.0 < self.first_local {
            module.values.get(id.index())
        } else {
            self.values.get((id.0 - self.first_local) as usize)
        }
    }

    pub fn instruction(&self, block: BlockId, index: usize) -> Option<&Instruction> {
        self.blocks
            .get(block.index())
            .and_then(|b| b.instructions.get(index))
    }
}

/// A decoded bitcode module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub version: Option<u64>,
    pub triple: Option<String>,
    pub datalayout: Option<String>,
    pub types: Vec<Type>,
    /// Module-level value sequence.
    pub values: Vec<Value>,
    pub globals: Vec<GlobalVar>,
    pub functions: Vec<DeclaredFunction>,
    /// Bodies in declaration order of their functions.
    pub bodies: Vec<FunctionBody>,
}

impl Module {
    pub fn ty(&self, id: TypeId) -> Option<&Type> {
        self.types.get(id.index())
    }

    /// Module-level constants in value order.
    pub fn constants(&self) -> impl Iterator<Item = Constant> + '_ {
        self.values.iter().filter_map(|v| match (&v.kind, v.ty) {
            (ValueKind::Constant(value), Some(ty)) => Some(Constant {
                ty,
                value: value.clone(),
            }),
            _ => None,
        })
    }

    /// First integer type of the given width.
    pub fn integer_type(&self, bits: u32) -> Option<TypeId> {
        self.types
            .iter()
            .position(|t| *t == Type::Integer { bits })
            .map(|i| TypeId(i as u32))
    }

    /// First pointer type to `pointee`.
    pub fn pointer_to(&self, pointee: TypeId) -> Option<TypeId> {
        self.types
            .iter()
            .position(|t| matches!(t, Type::Pointer { pointee: p, .. } if *p == pointee))
            .map(|i| TypeId(i as u32))
    }

    /// Pointee of a pointer type.
    pub fn pointee(&self, ty: TypeId) -> Option<TypeId> {
        match self.ty(ty) {
            Some(Type::Pointer { pointee, .. }) => Some(*pointee),
            _ => None,
        }
    }

    /// The function type itself, or the function type behind a pointer.
    pub fn function_type_of(&self, ty: TypeId) -> Option<TypeId> {
        match self.ty(ty) {
            Some(Type::Function { .. }) => Some(ty),
            Some(Type::Pointer { pointee, .. }) => {
                matches!(self.ty(*pointee), Some(Type::Function { .. })).then_some(*pointee)
            }
            _ => None,
        }
    }

    /// Name of a declared function, falling back to its index.
    pub fn function_name(&self, index: usize) -> String {
        self.functions
            .get(index)
            .and_then(|f| f.name.clone())
            .unwrap_or_else(|| format!("func_{}", index))
    }
}
