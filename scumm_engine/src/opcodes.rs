//! The closed opcode set understood by the dispatcher.
//!
//! Opcode bytes carry their own operand encoding: bits 0x80, 0x40 and 0x20
//! select "read a variable" instead of "read a literal" for the first, second
//! and third parameter. Decoding therefore maps every parameter variant of an
//! instruction onto one [`Opcode`].

pub const PARAM_1: u8 = 0x80;
pub const PARAM_2: u8 = 0x40;
pub const PARAM_3: u8 = 0x20;

/// Terminator of argument lists and actor sub-op lists.
pub const LIST_END: u8 = 0xFF;

/// Canonical byte of each instruction with every parameter literal.
pub mod op {
    pub const STOP_OBJECT_CODE: u8 = 0x00;
    pub const PUT_ACTOR: u8 = 0x01;
    pub const ANIMATE_ACTOR: u8 = 0x11;
    pub const IS_GREATER_EQUAL: u8 = 0x04;
    pub const IS_NOT_EQUAL: u8 = 0x08;
    pub const START_SCRIPT: u8 = 0x0A;
    pub const PAN_CAMERA_TO: u8 = 0x12;
    pub const ACTOR_OPS: u8 = 0x13;
    pub const JUMP_RELATIVE: u8 = 0x18;
    pub const DO_SENTENCE: u8 = 0x19;
    pub const MOVE: u8 = 0x1A;
    pub const MULTIPLY: u8 = 0x1B;
    pub const WALK_ACTOR_TO: u8 = 0x1E;
    pub const GET_ACTOR_Y: u8 = 0x23;
    pub const SET_VAR_RANGE: u8 = 0x26;
    pub const EQUAL_ZERO: u8 = 0x28;
    pub const DELAY_VARIABLE: u8 = 0x2B;
    pub const DELAY: u8 = 0x2E;
    pub const SET_CAMERA_AT: u8 = 0x32;
    pub const START_OBJECT: u8 = 0x37;
    pub const LESS_OR_EQUAL: u8 = 0x38;
    pub const SUBTRACT: u8 = 0x3A;
    pub const CUTSCENE: u8 = 0x40;
    pub const CHAIN_SCRIPT: u8 = 0x42;
    pub const GET_ACTOR_X: u8 = 0x43;
    pub const IS_LESS: u8 = 0x44;
    pub const INCREMENT: u8 = 0x46;
    pub const IS_EQUAL: u8 = 0x48;
    pub const GET_ACTOR_MOVING: u8 = 0x56;
    pub const OVERRIDE: u8 = 0x58;
    pub const ADD: u8 = 0x5A;
    pub const FREEZE_SCRIPTS: u8 = 0x60;
    pub const STOP_SCRIPT: u8 = 0x62;
    pub const IS_SCRIPT_RUNNING: u8 = 0x68;
    pub const STOP_OBJECT_SCRIPT: u8 = 0x6E;
    pub const IS_GREATER: u8 = 0x78;
    pub const GET_ACTOR_WALK_BOX: u8 = 0x7B;
    pub const BREAK_HERE: u8 = 0x80;
    pub const STOP_OBJECT_CODE_ALT: u8 = 0xA0;
    pub const NOT_EQUAL_ZERO: u8 = 0xA8;
    pub const WAIT: u8 = 0xAE;
    pub const END_CUTSCENE: u8 = 0xC0;
    pub const DECREMENT: u8 = 0xC6;
}

/// Flags folded into the start-script opcode byte.
pub const START_FREEZE_RESISTANT: u8 = 0x20;
pub const START_RECURSIVE: u8 = 0x40;

/// Sub-ops of [`Opcode::Wait`].
pub mod wait {
    pub const FOR_ACTOR: u8 = 1;
    pub const FOR_MESSAGE: u8 = 2;
    pub const FOR_CAMERA: u8 = 3;
    pub const FOR_SENTENCE: u8 = 4;
}

/// Sub-ops of [`Opcode::ActorOps`].
pub mod actor_ops {
    pub const WALK_SPEED: u8 = 4;
    pub const IGNORE_BOXES: u8 = 20;
    pub const FOLLOW_BOXES: u8 = 21;
}

/// Reserved animation codes of [`Opcode::AnimateActor`]. The low two bits
/// carry a direction code (see `actors::direction::from_old_dir`).
pub mod anim {
    pub const TURN: i32 = 0xF4;
    pub const FACE: i32 = 0xF8;
    pub const STOP: i32 = 0xFC;
}

/// Verb that clears the sentence queue instead of queueing a sentence.
pub const SENTENCE_CLEAR_VERB: i32 = 0xFE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    StopObjectCode,
    PutActor,
    AnimateActor,
    IsGreaterEqual,
    IsNotEqual,
    StartScript,
    PanCameraTo,
    ActorOps,
    JumpRelative,
    DoSentence,
    Move,
    Multiply,
    WalkActorTo,
    GetActorY,
    SetVarRange,
    EqualZero,
    DelayVariable,
    Delay,
    SetCameraAt,
    StartObject,
    LessOrEqual,
    Subtract,
    Cutscene,
    ChainScript,
    GetActorX,
    IsLess,
    Increment,
    IsEqual,
    GetActorMoving,
    Override,
    Add,
    FreezeScripts,
    StopScript,
    IsScriptRunning,
    StopObjectScript,
    IsGreater,
    GetActorWalkBox,
    BreakHere,
    NotEqualZero,
    Wait,
    EndCutscene,
    Decrement,
}

impl Opcode {
    pub fn decode(byte: u8) -> Option<Opcode> {
        use Opcode::*;
        let opcode = match byte {
            0x00 | 0xA0 => StopObjectCode,
            0x01 | 0x21 | 0x41 | 0x61 | 0x81 | 0xA1 | 0xC1 | 0xE1 => PutActor,
            0x11 | 0x51 | 0x91 | 0xD1 => AnimateActor,
            0x04 | 0x84 => IsGreaterEqual,
            0x08 | 0x88 => IsNotEqual,
            0x0A | 0x2A | 0x4A | 0x6A | 0x8A | 0xAA | 0xCA | 0xEA => StartScript,
            0x12 | 0x92 => PanCameraTo,
            0x13 | 0x53 | 0x93 | 0xD3 => ActorOps,
            0x18 => JumpRelative,
            0x19 | 0x39 | 0x59 | 0x79 | 0x99 | 0xB9 | 0xD9 | 0xF9 => DoSentence,
            0x1A | 0x9A => Move,
            0x1B | 0x9B => Multiply,
            0x1E | 0x3E | 0x5E | 0x7E | 0x9E | 0xBE | 0xDE | 0xFE => WalkActorTo,
            0x23 | 0xA3 => GetActorY,
            0x26 | 0xA6 => SetVarRange,
            0x28 => EqualZero,
            0x2B => DelayVariable,
            0x2E => Delay,
            0x32 | 0xB2 => SetCameraAt,
            0x37 | 0x77 | 0xB7 | 0xF7 => StartObject,
            0x38 | 0xB8 => LessOrEqual,
            0x3A | 0xBA => Subtract,
            0x40 => Cutscene,
            0x42 | 0xC2 => ChainScript,
            0x43 | 0xC3 => GetActorX,
            0x44 | 0xC4 => IsLess,
            0x46 => Increment,
            0x48 | 0xC8 => IsEqual,
            0x56 | 0xD6 => GetActorMoving,
            0x58 => Override,
            0x5A | 0xDA => Add,
            0x60 | 0xE0 => FreezeScripts,
            0x62 | 0xE2 => StopScript,
            0x68 | 0xE8 => IsScriptRunning,
            0x6E | 0xEE => StopObjectScript,
            0x78 | 0xF8 => IsGreater,
            0x7B | 0xFB => GetActorWalkBox,
            0x80 => BreakHere,
            0xA8 => NotEqualZero,
            0xAE => Wait,
            0xC0 => EndCutscene,
            0xC6 => Decrement,
            _ => return None,
        };
        Some(opcode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_variants_share_an_opcode() {
        for byte in [0x01, 0x21, 0x41, 0x61, 0x81, 0xA1, 0xC1, 0xE1] {
            assert_eq!(Opcode::decode(byte), Some(Opcode::PutActor));
        }
        assert_eq!(Opcode::decode(op::MOVE | PARAM_1), Some(Opcode::Move));
        assert_eq!(
            Opcode::decode(op::ANIMATE_ACTOR | PARAM_1 | PARAM_2),
            Some(Opcode::AnimateActor)
        );
        assert_eq!(
            Opcode::decode(op::START_SCRIPT | START_RECURSIVE | START_FREEZE_RESISTANT),
            Some(Opcode::StartScript)
        );
    }

    #[test]
    fn stop_and_break_are_distinct() {
        assert_eq!(Opcode::decode(op::STOP_OBJECT_CODE_ALT), Some(Opcode::StopObjectCode));
        assert_eq!(Opcode::decode(op::BREAK_HERE), Some(Opcode::BreakHere));
        assert_eq!(Opcode::decode(op::END_CUTSCENE), Some(Opcode::EndCutscene));
    }

    #[test]
    fn unknown_bytes_do_not_decode() {
        for byte in [0x02, 0x0C, 0x3F, 0x72, 0xFF] {
            assert_eq!(Opcode::decode(byte), None, "byte 0x{byte:02X}");
        }
    }
}
