use super::EmitUnit;
use super::writer::SourceWriter;

/// Longest state name the telemetry channel and event strings carry.
const STATE_NAME_SIZE: usize = 40;

/// The FPP component definition the framework generates the base class from.
pub(crate) fn render(unit: &EmitUnit) -> String {
    let machine = unit.machine;
    let mut w = SourceWriter::new();

    let namespaces = unit.namespaces();
    for ns in &namespaces {
        w.open(format!("module {} {{", ns));
    }
    w.blank();
    w.line(format!(
        "@ {} driven by state machine {}",
        machine.component_raw, machine.machine
    ));
    w.open(format!("active component {} {{", machine.component));
    w.blank();
    w.line("@ Scheduler tick, one dispatch per call");
    w.line("sync input port schedIn: Svc.Sched");
    w.blank();
    w.line("command recv port cmdIn");
    w.line("command reg port cmdRegOut");
    w.line("command resp port cmdResponseOut");
    w.line("event port eventOut");
    w.line("text event port textEventOut");
    w.line("telemetry port tlmOut");
    w.line("time get port timeCaller");
    w.blank();

    for (opcode, command) in machine.commands.iter().enumerate() {
        w.line(format!("async command {} opcode {}", command.mnemonic, opcode));
    }
    w.blank();

    w.line("@ Most recently entered state");
    w.line(format!(
        "telemetry {}: string size {} id 0",
        machine.telemetry_channel, STATE_NAME_SIZE
    ));
    w.blank();

    w.line(format!(
        "event {}(fromState: string size {}, toState: string size {}) \\",
        machine.transition_event, STATE_NAME_SIZE, STATE_NAME_SIZE
    ));
    w.indent();
    w.line("severity activity high \\");
    w.line("id 0 \\");
    w.line("format \"State transition: {} -> {}\"");
    w.dedent();
    w.blank();
    w.close("}");
    w.blank();

    for _ in namespaces.iter().rev() {
        w.close("}");
    }
    w.finish()
}
