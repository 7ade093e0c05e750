//! Block ids and record codes of the bitcode format.

// Block ids.
pub const MODULE_BLOCK_ID: u64 = 8;
pub const PARAMATTR_BLOCK_ID: u64 = 9;
pub const PARAMATTR_GROUP_BLOCK_ID: u64 = 10;
pub const CONSTANTS_BLOCK_ID: u64 = 11;
pub const FUNCTION_BLOCK_ID: u64 = 12;
pub const TYPE_SYMTAB_BLOCK_ID: u64 = 13;
pub const VALUE_SYMTAB_BLOCK_ID: u64 = 14;
pub const METADATA_BLOCK_ID: u64 = 15;
pub const METADATA_ATTACHMENT_ID: u64 = 16;
pub const TYPE_BLOCK_ID_NEW: u64 = 17;
/// Top-level producer identification block (shares its number with TYPE_SYMTAB).
pub const IDENTIFICATION_BLOCK_ID: u64 = 13;

// MODULE_BLOCK records.
pub const MODULE_CODE_VERSION: u64 = 1;
pub const MODULE_CODE_TRIPLE: u64 = 2;
pub const MODULE_CODE_DATALAYOUT: u64 = 3;
pub const MODULE_CODE_GLOBALVAR: u64 = 7;
pub const MODULE_CODE_FUNCTION: u64 = 8;

// TYPE_BLOCK records.
pub const TYPE_CODE_NUMENTRY: u64 = 1;
pub const TYPE_CODE_VOID: u64 = 2;
pub const TYPE_CODE_FLOAT: u64 = 3;
pub const TYPE_CODE_DOUBLE: u64 = 4;
pub const TYPE_CODE_LABEL: u64 = 5;
pub const TYPE_CODE_OPAQUE: u64 = 6;
pub const TYPE_CODE_INTEGER: u64 = 7;
pub const TYPE_CODE_POINTER: u64 = 8;
pub const TYPE_CODE_FUNCTION_OLD: u64 = 9;
pub const TYPE_CODE_HALF: u64 = 10;
pub const TYPE_CODE_ARRAY: u64 = 11;
pub const TYPE_CODE_VECTOR: u64 = 12;
pub const TYPE_CODE_METADATA: u64 = 16;
pub const TYPE_CODE_STRUCT_ANON: u64 = 18;
pub const TYPE_CODE_STRUCT_NAME: u64 = 19;
pub const TYPE_CODE_STRUCT_NAMED: u64 = 20;
pub const TYPE_CODE_FUNCTION: u64 = 21;

// CONSTANTS_BLOCK records.
pub const CST_CODE_SETTYPE: u64 = 1;
pub const CST_CODE_NULL: u64 = 2;
pub const CST_CODE_UNDEF: u64 = 3;
pub const CST_CODE_INTEGER: u64 = 4;
pub const CST_CODE_WIDE_INTEGER: u64 = 5;
pub const CST_CODE_FLOAT: u64 = 6;
pub const CST_CODE_AGGREGATE: u64 = 7;
pub const CST_CODE_STRING: u64 = 8;
pub const CST_CODE_CSTRING: u64 = 9;
pub const CST_CODE_CE_GEP: u64 = 12;
pub const CST_CODE_CE_INBOUNDS_GEP: u64 = 20;

// VALUE_SYMTAB records.
pub const VST_CODE_ENTRY: u64 = 1;
pub const VST_CODE_BBENTRY: u64 = 2;
pub const VST_CODE_FNENTRY: u64 = 3;

// FUNCTION_BLOCK records.
pub const FUNC_CODE_DECLAREBLOCKS: u64 = 1;
pub const FUNC_CODE_INST_BINOP: u64 = 2;
pub const FUNC_CODE_INST_CAST: u64 = 3;
pub const FUNC_CODE_INST_GEP_OLD: u64 = 4;
pub const FUNC_CODE_INST_SELECT: u64 = 5;
pub const FUNC_CODE_INST_EXTRACTELT: u64 = 6;
pub const FUNC_CODE_INST_INSERTELT: u64 = 7;
pub const FUNC_CODE_INST_SHUFFLEVEC: u64 = 8;
pub const FUNC_CODE_INST_CMP: u64 = 9;
pub const FUNC_CODE_INST_RET: u64 = 10;
pub const FUNC_CODE_INST_BR: u64 = 11;
pub const FUNC_CODE_INST_SWITCH: u64 = 12;
pub const FUNC_CODE_INST_INVOKE: u64 = 13;
pub const FUNC_CODE_INST_UNREACHABLE: u64 = 15;
pub const FUNC_CODE_INST_PHI: u64 = 16;
pub const FUNC_CODE_INST_ALLOCA: u64 = 19;
pub const FUNC_CODE_INST_LOAD: u64 = 20;
pub const FUNC_CODE_INST_VAARG: u64 = 23;
pub const FUNC_CODE_INST_STORE_OLD: u64 = 24;
pub const FUNC_CODE_INST_EXTRACTVAL: u64 = 26;
pub const FUNC_CODE_INST_INSERTVAL: u64 = 27;
pub const FUNC_CODE_INST_CMP2: u64 = 28;
pub const FUNC_CODE_INST_VSELECT: u64 = 29;
pub const FUNC_CODE_INST_INBOUNDS_GEP_OLD: u64 = 30;
pub const FUNC_CODE_INST_INDIRECTBR: u64 = 31;
pub const FUNC_CODE_DEBUG_LOC_AGAIN: u64 = 33;
pub const FUNC_CODE_INST_CALL: u64 = 34;
pub const FUNC_CODE_DEBUG_LOC: u64 = 35;
pub const FUNC_CODE_INST_FENCE: u64 = 36;
pub const FUNC_CODE_INST_CMPXCHG_OLD: u64 = 37;
pub const FUNC_CODE_INST_ATOMICRMW: u64 = 38;
pub const FUNC_CODE_INST_RESUME: u64 = 39;
pub const FUNC_CODE_INST_LANDINGPAD_OLD: u64 = 40;
pub const FUNC_CODE_INST_LOADATOMIC: u64 = 41;
pub const FUNC_CODE_INST_STOREATOMIC_OLD: u64 = 42;
pub const FUNC_CODE_INST_GEP: u64 = 43;
pub const FUNC_CODE_INST_STORE: u64 = 44;
pub const FUNC_CODE_INST_STOREATOMIC: u64 = 45;
pub const FUNC_CODE_INST_CMPXCHG: u64 = 46;
pub const FUNC_CODE_INST_LANDINGPAD: u64 = 47;
pub const FUNC_CODE_INST_CLEANUPRET: u64 = 48;
pub const FUNC_CODE_INST_CATCHRET: u64 = 49;
pub const FUNC_CODE_INST_CATCHPAD: u64 = 50;
pub const FUNC_CODE_INST_TERMINATEPAD: u64 = 51;
pub const FUNC_CODE_INST_CLEANUPPAD: u64 = 52;
pub const FUNC_CODE_INST_CATCHENDPAD: u64 = 53;
pub const FUNC_CODE_INST_CLEANUPENDPAD: u64 = 54;
pub const FUNC_CODE_OPERAND_BUNDLE: u64 = 55;

/// CALL calling-convention word: explicit function type follows.
pub const CALL_EXPLICIT_TYPE_BIT: u64 = 1 << 15;
/// CALL calling-convention word: fast-math flags follow.
pub const CALL_FMF_BIT: u64 = 1 << 17;
/// ALLOCA alignment word: the first operand is the allocated type.
pub const ALLOCA_EXPLICIT_TYPE_BIT: u64 = 1 << 6;

/// Human-readable name of a function-block record code.
pub fn opcode_name(code: u64) -> &'static str {
    match code {
        FUNC_CODE_DECLAREBLOCKS => "declareblocks",
        FUNC_CODE_INST_BINOP => "binop",
        FUNC_CODE_INST_CAST => "cast",
        FUNC_CODE_INST_GEP_OLD => "gep_old",
        FUNC_CODE_INST_SELECT => "select",
        FUNC_CODE_INST_EXTRACTELT => "extractelement",
        FUNC_CODE_INST_INSERTELT => "insertelement",
        FUNC_CODE_INST_SHUFFLEVEC => "shufflevector",
        FUNC_CODE_INST_CMP => "cmp",
        FUNC_CODE_INST_RET => "ret",
        FUNC_CODE_INST_BR => "br",
        FUNC_CODE_INST_SWITCH => "switch",
        FUNC_CODE_INST_INVOKE => "invoke",
        FUNC_CODE_INST_UNREACHABLE => "unreachable",
        FUNC_CODE_INST_PHI => "phi",
        FUNC_CODE_INST_ALLOCA => "alloca",
        FUNC_CODE_INST_LOAD => "load",
        FUNC_CODE_INST_VAARG => "va_arg",
        FUNC_CODE_INST_STORE_OLD => "store_old",
        FUNC_CODE_INST_EXTRACTVAL => "extractvalue",
        FUNC_CODE_INST_INSERTVAL => "insertvalue",
        FUNC_CODE_INST_CMP2 => "cmp2",
        FUNC_CODE_INST_VSELECT => "vselect",
        FUNC_CODE_INST_INBOUNDS_GEP_OLD => "inbounds_gep_old",
        FUNC_CODE_INST_INDIRECTBR => "indirectbr",
        FUNC_CODE_DEBUG_LOC_AGAIN => "debug_loc_again",
        FUNC_CODE_INST_CALL => "call",
        FUNC_CODE_DEBUG_LOC => "debug_loc",
        FUNC_CODE_INST_FENCE => "fence",
        FUNC_CODE_INST_CMPXCHG_OLD => "cmpxchg_old",
        FUNC_CODE_INST_ATOMICRMW => "atomicrmw",
        FUNC_CODE_INST_RESUME => "resume",
        FUNC_CODE_INST_LANDINGPAD_OLD => "landingpad_old",
        FUNC_CODE_INST_LOADATOMIC => "load_atomic",
        FUNC_CODE_INST_STOREATOMIC_OLD => "store_atomic_old",
        FUNC_CODE_INST_GEP => "getelementptr",
        FUNC_CODE_INST_STORE => "store",
        FUNC_CODE_INST_STOREATOMIC => "store_atomic",
        FUNC_CODE_INST_CMPXCHG => "cmpxchg",
        FUNC_CODE_INST_LANDINGPAD => "landingpad",
        FUNC_CODE_INST_CLEANUPRET => "cleanupret",
        FUNC_CODE_INST_CATCHRET => "catchret",
        FUNC_CODE_INST_CATCHPAD => "catchpad",
        FUNC_CODE_INST_TERMINATEPAD => "terminatepad",
        FUNC_CODE_INST_CLEANUPPAD => "cleanuppad",
        FUNC_CODE_INST_CATCHENDPAD => "catchendpad",
        FUNC_CODE_INST_CLEANUPENDPAD => "cleanupendpad",
        FUNC_CODE_OPERAND_BUNDLE => "operand_bundle",
        _ => "unknown",
    }
}

/// Codes kept as opaque instructions when they are not decoded in full.
pub fn is_allow_listed(code: u64) -> bool {
    matches!(
        code,
        FUNC_CODE_INST_CAST
            | FUNC_CODE_INST_GEP_OLD
            | FUNC_CODE_INST_SELECT
            | FUNC_CODE_INST_EXTRACTELT
            | FUNC_CODE_INST_INSERTELT
            | FUNC_CODE_INST_SHUFFLEVEC
            | FUNC_CODE_INST_CMP
            | FUNC_CODE_INST_SWITCH
            | FUNC_CODE_INST_INVOKE
            | FUNC_CODE_INST_UNREACHABLE
            | FUNC_CODE_INST_PHI
            | FUNC_CODE_INST_VAARG
            | FUNC_CODE_INST_STORE_OLD
            | FUNC_CODE_INST_EXTRACTVAL
            | FUNC_CODE_INST_INSERTVAL
            | FUNC_CODE_INST_VSELECT
            | FUNC_CODE_INST_INBOUNDS_GEP_OLD
            | FUNC_CODE_INST_INDIRECTBR
            | FUNC_CODE_INST_FENCE
            | FUNC_CODE_INST_CMPXCHG_OLD
            | FUNC_CODE_INST_ATOMICRMW
            | FUNC_CODE_INST_RESUME
            | FUNC_CODE_INST_LANDINGPAD_OLD
            | FUNC_CODE_INST_LOADATOMIC
            | FUNC_CODE_INST_STOREATOMIC_OLD
            | FUNC_CODE_INST_GEP
            | FUNC_CODE_INST_STOREATOMIC
            | FUNC_CODE_INST_CMPXCHG
            | FUNC_CODE_INST_LANDINGPAD
            | FUNC_CODE_INST_CLEANUPRET
            | FUNC_CODE_INST_CATCHRET
            | FUNC_CODE_INST_CATCHPAD
            | FUNC_CODE_INST_TERMINATEPAD
            | FUNC_CODE_INST_CLEANUPPAD
            | FUNC_CODE_INST_CATCHENDPAD
            | FUNC_CODE_INST_CLEANUPENDPAD
            | FUNC_CODE_OPERAND_BUNDLE
    )
}

/// Whether an opaque instruction with this code ends its basic block.
pub fn is_terminator(code: u64) -> bool {
    matches!(
        code,
        FUNC_CODE_INST_RET
            | FUNC_CODE_INST_BR
            | FUNC_CODE_INST_SWITCH
            | FUNC_CODE_INST_INDIRECTBR
            | FUNC_CODE_INST_INVOKE
            | FUNC_CODE_INST_RESUME
            | FUNC_CODE_INST_CATCHPAD
            | FUNC_CODE_INST_CATCHENDPAD
            | FUNC_CODE_INST_CATCHRET
            | FUNC_CODE_INST_TERMINATEPAD
            | FUNC_CODE_INST_UNREACHABLE
    )
}

/// Whether an opaque instruction with this code defines an SSA value.
pub fn produces_value(code: u64) -> bool {
    matches!(
        code,
        FUNC_CODE_INST_INVOKE
            | FUNC_CODE_INST_CATCHPAD
            | FUNC_CODE_INST_BINOP
            | FUNC_CODE_INST_ALLOCA
            | FUNC_CODE_INST_LOAD
            | FUNC_CODE_INST_GEP
            | FUNC_CODE_INST_GEP_OLD
            | FUNC_CODE_INST_CAST
            | FUNC_CODE_INST_CMP
            | FUNC_CODE_INST_CMP2
            | FUNC_CODE_INST_PHI
            | FUNC_CODE_INST_SELECT
            | FUNC_CODE_INST_CALL
            | FUNC_CODE_INST_VAARG
            | FUNC_CODE_INST_LANDINGPAD
            | FUNC_CODE_INST_LANDINGPAD_OLD
            | FUNC_CODE_INST_CLEANUPPAD
    )
}
