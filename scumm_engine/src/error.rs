use thiserror::Error;

pub type VmResult<T> = Result<T, VmError>;

/// Fatal conditions raised while executing bytecode. Route lookups and
/// stale resumes are not errors; they surface as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    #[error("unsupported opcode 0x{opcode:02X} in script {script} at offset {offset}")]
    UnsupportedOpcode {
        opcode: u8,
        script: u16,
        offset: usize,
    },
    #[error("unsupported sub-opcode 0x{sub:02X} of opcode 0x{opcode:02X} in script {script}")]
    UnsupportedSubOpcode { opcode: u8, sub: u8, script: u16 },
    #[error("cutscene stack overflow at depth {depth}")]
    CutsceneOverflow { depth: usize },
    #[error("too many nested scripts (limit {limit})")]
    NestingOverflow { limit: usize },
    #[error("ran out of script slots ({slots} in use)")]
    SlotTableFull { slots: usize },
    #[error("script {script} ends inside an instruction at offset {offset}")]
    TruncatedScript { script: u16, offset: usize },
    #[error("script {number} is not loaded")]
    MissingScript { number: u16 },
    #[error("{kind} variable {index} out of range (limit {limit})")]
    VariableOutOfRange {
        kind: &'static str,
        index: usize,
        limit: usize,
    },
    #[error("unknown actor {0}")]
    UnknownActor(i32),
    #[error("jump label {0} was never bound")]
    UnboundLabel(usize),
}
