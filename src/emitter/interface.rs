use super::writer::SourceWriter;
use super::{EmitUnit, RecordLayout, activity_signature, cpp_literal, cpp_scalar};
use itertools::Itertools;

pub(crate) fn render(unit: &EmitUnit) -> String {
    let machine = unit.machine;
    let class = unit.class_name();
    let guard = format!("{}_COMPONENT_IMPL_HPP", machine.component.to_ascii_uppercase());
    let mut w = SourceWriter::new();

    w.line(format!("#ifndef {}", guard));
    w.line(format!("#define {}", guard));
    w.blank();
    w.line(format!("// Component: {}", machine.component_raw));
    w.line(format!("// StateMachine: {}", machine.machine));
    w.blank();
    w.line(format!("#include \"{}ComponentAc.hpp\"", machine.component));
    w.blank();

    let namespaces = unit.namespaces();
    for ns in &namespaces {
        w.open(format!("namespace {} {{", ns));
    }
    w.blank();

    for record in &unit.records {
        render_record(&mut w, record);
        w.blank();
    }

    w.line(format!("class {} :", class));
    w.line(format!("  public {}", unit.base_name()));
    w.open("{");
    w.blank();
    w.open("public:");
    w.line(format!("{}(const char* const compName);", class));
    w.line(format!("~{}();", class));
    w.blank();
    w.line("void initializeStateMachine();");
    w.line("void processStateMachine();");
    w.line("void schedIn_handler(const NATIVE_INT_TYPE portNum, NATIVE_UINT_TYPE context);");
    w.blank();
    w.line("// Command handlers");
    for command in &machine.commands {
        w.line(format!("void {}(", command.handler));
        w.line("    const FwOpcodeType opCode,");
        w.line("    const U32 cmdSeq");
        w.line(") override;");
    }
    w.dedent();
    w.blank();

    w.open("private:");
    w.open("enum StateMachineStates {");
    let last = machine.states.len().saturating_sub(1);
    for (index, state) in machine.states.iter().enumerate() {
        let comma = if index == last { "" } else { "," };
        w.line(format!("{} = {}{}", state.constant, state.value, comma));
    }
    w.close("};");
    w.blank();
    w.line("StateMachineStates m_currentState;");
    w.line("bool m_stateMachineActive;");
    for attribute in &machine.attributes {
        w.line(format!("{} {};", cpp_scalar(attribute.scalar), attribute.member));
    }
    w.blank();
    w.line("void transitionToState(StateMachineStates newState);");
    w.line("const char* getStateName(StateMachineStates state);");

    if !machine.guards.is_empty() {
        w.blank();
        w.line("// Transition guards");
        for guard in &machine.guards {
            w.line(format!("bool {}(); // {}", guard.method, guard.source));
        }
    }

    if !unit.activities.is_empty() {
        w.blank();
        w.line("// Activities");
        for activity in &unit.activities {
            w.line(format!("{};", activity_signature(activity, "")));
        }
    }

    let support = unit.binding.support_declarations();
    if !support.is_empty() {
        w.blank();
        w.line("// Mock framework diagnostics");
        for line in support {
            w.line(*line);
        }
    }
    w.dedent();
    w.blank();
    w.close("};");
    w.blank();

    for ns in namespaces.iter().rev() {
        w.close(format!("}} // end namespace {}", ns));
    }
    w.blank();
    w.line(format!("#endif // {}", guard));
    w.finish()
}

/// Records are shared between components, so each carries its own guard.
fn render_record(w: &mut SourceWriter, record: &RecordLayout) {
    let guard = format!("{}_RECORD_DEFINED", record.ident.to_ascii_uppercase());
    w.line(format!("#ifndef {}", guard));
    w.line(format!("#define {}", guard));
    w.open(format!("struct {} {{", record.ident));
    for (name, scalar) in &record.fields {
        w.line(format!("{} {};", cpp_scalar(*scalar), name));
    }
    w.blank();
    let init = record
        .fields
        .iter()
        .map(|(name, scalar)| format!("{}({})", name, cpp_literal(scalar.zero())))
        .join(", ");
    if init.is_empty() {
        w.line(format!("{}() {{}}", record.ident));
    } else {
        w.line(format!("{}() : {} {{}}", record.ident, init));
    }
    w.close("};");
    w.line(format!("#endif // {}", guard));
}
