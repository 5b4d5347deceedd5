use serde::{Deserialize, Serialize};
use std::fmt;

/// Which concrete sinks the emitted side-effect calls target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingProfile {
    /// Calls into the framework's generated base class.
    #[default]
    Production,
    /// Calls diagnostic helpers that print instead of using the framework.
    Mock,
}

impl BindingProfile {
    pub(crate) fn binding(self) -> &'static dyn Binding {
        match self {
            BindingProfile::Production => &ProductionBinding,
            BindingProfile::Mock => &MockBinding,
        }
    }
}

impl fmt::Display for BindingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingProfile::Production => write!(f, "production"),
            BindingProfile::Mock => write!(f, "mock"),
        }
    }
}

impl std::str::FromStr for BindingProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" => Ok(BindingProfile::Production),
            "mock" => Ok(BindingProfile::Mock),
            other => Err(format!("unknown binding profile '{}'", other)),
        }
    }
}

/// The call targets of the emitted side effects. Arguments are already C++ expressions;
/// every method returns a single statement without the trailing semicolon.
pub(crate) trait Binding: Sync {
    fn log_event(&self, event: &str, from: &str, to: &str) -> String;
    fn telemetry(&self, channel: &str, value: &str) -> String;
    fn command_response(&self, status: &str) -> String;
    fn fatal(&self, value: &str) -> String;

    /// Extra `#include` lines of the implementation file.
    fn includes(&self) -> &'static [&'static str];

    /// Helper member declarations, empty when the framework provides everything.
    fn support_declarations(&self) -> &'static [&'static str] {
        &[]
    }

    /// Helper member definitions for `class`.
    fn support_definitions(&self, _class: &str) -> Vec<String> {
        Vec::new()
    }
}

struct ProductionBinding;

impl Binding for ProductionBinding {
    fn log_event(&self, event: &str, from: &str, to: &str) -> String {
        format!("this->log_ACTIVITY_HI_{}({}, {})", event, from, to)
    }

    fn telemetry(&self, channel: &str, value: &str) -> String {
        format!("this->tlmWrite_{}({})", channel, value)
    }

    fn command_response(&self, status: &str) -> String {
        format!("this->cmdResponse_out(opCode, cmdSeq, Fw::CmdResponse::{})", status)
    }

    fn fatal(&self, value: &str) -> String {
        format!("FW_ASSERT(0, {})", value)
    }

    fn includes(&self) -> &'static [&'static str] {
        &["#include <Fw/Types/Assert.hpp>"]
    }
}

struct MockBinding;

impl Binding for MockBinding {
    fn log_event(&self, event: &str, from: &str, to: &str) -> String {
        format!("this->mockLogEvent(\"{}\", {}, {})", event, from, to)
    }

    fn telemetry(&self, channel: &str, value: &str) -> String {
        format!("this->mockTlmWrite(\"{}\", {})", channel, value)
    }

    fn command_response(&self, status: &str) -> String {
        format!("this->mockCmdResponse(opCode, cmdSeq, Fw::CmdResponse::{})", status)
    }

    fn fatal(&self, value: &str) -> String {
        format!("this->mockAssert({})", value)
    }

    fn includes(&self) -> &'static [&'static str] {
        &["#include <cstdlib>", "#include <iostream>"]
    }

    fn support_declarations(&self) -> &'static [&'static str] {
        &[
            "void mockCmdResponse(FwOpcodeType opCode, U32 cmdSeq, Fw::CmdResponse response);",
            "void mockTlmWrite(const char* channel, const char* val);",
            "void mockLogEvent(const char* event, const char* arg1, const char* arg2);",
            "void mockAssert(NATIVE_UINT_TYPE value);",
        ]
    }

    fn support_definitions(&self, class: &str) -> Vec<String> {
        [
            format!(
                "void {}::mockCmdResponse(FwOpcodeType opCode, U32 cmdSeq, Fw::CmdResponse response)",
                class
            ),
            "{".to_string(),
            "  std::cout << \"Mock CMD Response: opCode=0x\" << std::hex << opCode".to_string(),
            "            << \" cmdSeq=\" << std::dec << cmdSeq << \" response=\" << response.e << std::endl;"
                .to_string(),
            "}".to_string(),
            String::new(),
            format!("void {}::mockTlmWrite(const char* channel, const char* val)", class),
            "{".to_string(),
            "  std::cout << \"Mock TLM: \" << channel << \" = \" << val << std::endl;".to_string(),
            "}".to_string(),
            String::new(),
            format!(
                "void {}::mockLogEvent(const char* event, const char* arg1, const char* arg2)",
                class
            ),
            "{".to_string(),
            "  std::cout << \"Mock EVENT: \" << event << \"(\" << arg1 << \", \" << arg2 << \")\" << std::endl;"
                .to_string(),
            "}".to_string(),
            String::new(),
            format!("void {}::mockAssert(NATIVE_UINT_TYPE value)", class),
            "{".to_string(),
            "  std::cout << \"Mock ASSERT: unreachable state \" << value << std::endl;".to_string(),
            "  std::abort();".to_string(),
            "}".to_string(),
        ]
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_parse_case_insensitively() {
        assert_eq!("Mock".parse::<BindingProfile>(), Ok(BindingProfile::Mock));
        assert_eq!("production".parse::<BindingProfile>(), Ok(BindingProfile::Production));
        assert!("fprime".parse::<BindingProfile>().is_err());
    }

    #[test]
    fn test_production_targets_framework_calls() {
        let b = BindingProfile::Production.binding();
        assert_eq!(
            b.log_event("StateTransition", "\"INIT\"", "\"ON\""),
            "this->log_ACTIVITY_HI_StateTransition(\"INIT\", \"ON\")"
        );
        assert_eq!(b.telemetry("CurrentState", "\"ON\""), "this->tlmWrite_CurrentState(\"ON\")");
        assert_eq!(b.fatal("m_currentState"), "FW_ASSERT(0, m_currentState)");
    }
}
