//! Script VM and actor box navigation for SCUMM-era adventure games.
//!
//! [`Engine`] owns every arena the VM touches: the variable store, the
//! script slot table, the cutscene and sentence stacks, the actors and the
//! walk boxes of the current room. Hosts load bytecode into the
//! [`ScriptLibrary`], start a boot script and call [`Engine::tick`] once per
//! game frame.

pub mod actors;
pub mod bytecode;
pub mod boxes;
pub mod config;
pub mod cutscenes;
pub mod engine;
pub mod error;
pub mod interpreter;
pub mod library;
pub mod opcodes;
pub mod runtime;
pub mod scenario;
pub mod scheduler;
pub mod sentence;
pub mod vars;

pub mod cli;

pub use actors::{Actor, MoveFlags};
pub use boxes::RoomBoxes;
pub use bytecode::{Label, Operand, ScriptBuilder, ScriptCursor};
pub use config::{AddressingPolicy, EngineConfig};
pub use engine::{Camera, Engine};
pub use error::{VmError, VmResult};
pub use library::{ObjectCode, ScriptLibrary};
pub use scenario::Scenario;
pub use scheduler::{ScriptLocation, ScriptScheduler, ScriptSlot, SlotStatus};
pub use vars::{VarAddress, VariableStore};
