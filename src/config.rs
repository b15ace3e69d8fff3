use serde::Deserialize;

/// What to do with a word that does not decode. The reference architecture
/// leaves this open, so it is a policy knob rather than a hardcoded choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownOpcodePolicy {
    /// Stop the cycle and hand the decode error to the host.
    Halt,
    /// Log the word and continue at the already-advanced program counter,
    /// i.e. a deterministic two-byte skip.
    Skip,
}

/// Host-tunable knobs.
///
/// `speed` is the number of instructions executed per `cycle` call; with a
/// host loop running near 60 Hz, the default of 10 gives the apparent
/// speed most titles were written for. Deserializable so hosts can read it
/// from a config file in whatever serde format they like.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub speed: usize,
    pub unknown_opcode: UnknownOpcodePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            speed: 10,
            unknown_opcode: UnknownOpcodePolicy::Halt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_machine() {
        let config = Config::default();
        assert_eq!(config.speed, 10);
        assert_eq!(config.unknown_opcode, UnknownOpcodePolicy::Halt);
    }

    #[test]
    fn deserializes_with_field_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());

        let config: Config =
            serde_json::from_str(r#"{ "speed": 20, "unknown_opcode": "skip" }"#).unwrap();
        assert_eq!(config.speed, 20);
        assert_eq!(config.unknown_opcode, UnknownOpcodePolicy::Skip);
    }
}
