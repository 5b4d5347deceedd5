use super::writer::SourceWriter;
use super::{EmitUnit, activity_signature, cpp_literal, cpp_scalar, cpp_string, cpp_type};
use crate::ast::{ScalarType, Value};
use crate::compiler::{CompiledActivity, Statement};
use crate::model::CommandKind;
use crate::synth::{
    CommandEntry, ComponentStateMachine, LifecycleStep, StepName, TRANSITION_SEQUENCE,
    TransitionStep, UNKNOWN_STATE,
};
use itertools::Itertools;

pub(crate) fn render(unit: &EmitUnit) -> String {
    let machine = unit.machine;
    let class = unit.class_name();
    let mut w = SourceWriter::new();

    w.line(format!("#include \"{}.hpp\"", class));
    for include in unit.binding.includes() {
        w.line(*include);
    }
    w.blank();
    w.line(format!("// Component: {}", machine.component_raw));
    w.line(format!("// StateMachine: {}", machine.machine));
    w.blank();

    let namespaces = unit.namespaces();
    for ns in &namespaces {
        w.open(format!("namespace {} {{", ns));
    }
    w.blank();

    render_lifecycle(&mut w, unit, &class);
    render_dispatch(&mut w, unit, &class);
    for command in &machine.commands {
        render_command(&mut w, unit, &class, command);
    }
    render_transition(&mut w, unit, &class);
    render_state_names(&mut w, machine, &class);

    for guard in &machine.guards {
        w.line(format!("bool {}::{}()", class, guard.method));
        w.open("{");
        w.line(format!("// {}", guard.source));
        let expression = guard.expression.render(&|name| format!("m_{}", name));
        w.line(format!("return {};", expression));
        w.close("}");
        w.blank();
    }

    for activity in &unit.activities {
        render_activity(&mut w, &class, activity);
    }

    let support = unit.binding.support_definitions(&class);
    if !support.is_empty() {
        w.line("// Mock framework diagnostics");
        w.blank();
        for line in &support {
            w.line(line);
        }
        w.blank();
    }

    for ns in namespaces.iter().rev() {
        w.close(format!("}} // end namespace {}", ns));
    }
    w.finish()
}

fn render_lifecycle(w: &mut SourceWriter, unit: &EmitUnit, class: &str) {
    let machine = unit.machine;
    w.line(format!("{}::{}(const char* const compName) :", class, class));
    w.line(format!("  {}(compName),", unit.base_name()));
    let mut init = vec![
        format!("m_currentState({})", machine.states[machine.initial].constant),
        "m_stateMachineActive(false)".to_string(),
    ];
    for attribute in &machine.attributes {
        init.push(format!(
            "{}({})",
            attribute.member,
            cpp_literal(attribute.scalar.zero())
        ));
    }
    w.indent();
    let last = init.len() - 1;
    for (index, member) in init.iter().enumerate() {
        w.line(if index == last {
            member.clone()
        } else {
            format!("{},", member)
        });
    }
    w.dedent();
    w.line("{");
    w.line("}");
    w.blank();
    w.line(format!("{}::~{}()", class, class));
    w.line("{");
    w.line("}");
    w.blank();

    w.line(format!("void {}::initializeStateMachine()", class));
    w.open("{");
    render_steps(w, unit, &machine.start);
    w.close("}");
    w.blank();

    w.line(format!(
        "void {}::schedIn_handler(const NATIVE_INT_TYPE portNum, NATIVE_UINT_TYPE context)",
        class
    ));
    w.open("{");
    w.line("processStateMachine();");
    w.close("}");
    w.blank();
}

fn render_steps(w: &mut SourceWriter, unit: &EmitUnit, steps: &[LifecycleStep]) {
    let machine = unit.machine;
    let name = |step: StepName| match step {
        StepName::Marker(marker) => cpp_string(marker),
        StepName::State(state) => cpp_string(machine.state_name(state)),
    };
    for step in steps {
        match *step {
            LifecycleStep::SetCurrent(state) => {
                w.line(format!("m_currentState = {};", machine.states[state].constant));
            }
            LifecycleStep::SetActive(active) => {
                w.line(format!("m_stateMachineActive = {};", active));
            }
            LifecycleStep::Log { from, to } => {
                let call = unit
                    .binding
                    .log_event(&machine.transition_event, &name(from), &name(to));
                w.line(format!("{};", call));
            }
            LifecycleStep::Telemetry(state) => {
                let call = unit
                    .binding
                    .telemetry(&machine.telemetry_channel, &name(StepName::State(state)));
                w.line(format!("{};", call));
            }
        }
    }
}

fn render_dispatch(w: &mut SourceWriter, unit: &EmitUnit, class: &str) {
    let machine = unit.machine;
    w.line(format!("void {}::processStateMachine()", class));
    w.open("{");
    w.open("if (!m_stateMachineActive) {");
    w.line("return;");
    w.close("}");
    w.blank();
    w.open("switch (m_currentState) {");
    for arm in &machine.dispatch.arms {
        let state = &machine.states[arm.state];
        w.open(format!("case {}:", state.constant));
        w.line(format!("// State: {}", state.raw));
        for activity in &arm.activities {
            w.line(format!("{}();", activity.ident));
        }
        render_candidates(w, machine, &arm.transitions);
        w.line("break;");
        w.dedent();
        w.blank();
    }
    w.open("default:");
    w.line(format!("{};", unit.binding.fatal("m_currentState")));
    w.line("break;");
    w.dedent();
    w.close("}");
    w.close("}");
    w.blank();
}

/// The first permitted candidate fires; an unguarded one ends the list.
fn render_candidates(w: &mut SourceWriter, machine: &ComponentStateMachine, candidates: &[usize]) {
    for &index in candidates {
        let transition = &machine.transitions[index];
        let target = &machine.states[transition.target].constant;
        match transition.guard {
            Some(guard) => {
                w.open(format!("if ({}()) {{", machine.guards[guard].method));
                w.line(format!("transitionToState({});", target));
                w.line("break;");
                w.close("}");
            }
            None => {
                w.line(format!("transitionToState({});", target));
                return;
            }
        }
    }
}

fn render_command(w: &mut SourceWriter, unit: &EmitUnit, class: &str, command: &CommandEntry) {
    let machine = unit.machine;
    let binding = unit.binding;
    w.line(format!("void {}::{}(", class, command.handler));
    w.line("    const FwOpcodeType opCode,");
    w.line("    const U32 cmdSeq");
    w.line(")");
    w.open("{");
    match &command.kind {
        CommandKind::Start => {
            w.line("initializeStateMachine();");
        }
        CommandKind::Stop => render_steps(w, unit, &machine.stop),
        CommandKind::Trigger(signal) => {
            w.line(format!("// Signal: {}", signal));
            w.open("if (!m_stateMachineActive) {");
            w.line(format!("{};", binding.command_response("EXECUTION_ERROR")));
            w.line("return;");
            w.close("}");
            w.blank();
            w.open("switch (m_currentState) {");
            for (index, state) in machine.states.iter().enumerate() {
                w.open(format!("case {}:", state.constant));
                if let Some((_, transitions)) = command.arms.iter().find(|(s, _)| *s == index) {
                    render_candidates(w, machine, transitions);
                }
                w.line("break;");
                w.dedent();
            }
            w.open("default:");
            w.line(format!("{};", binding.fatal("m_currentState")));
            w.line("break;");
            w.dedent();
            w.close("}");
        }
    }
    w.line(format!("{};", binding.command_response("OK")));
    w.close("}");
    w.blank();
}

fn render_transition(w: &mut SourceWriter, unit: &EmitUnit, class: &str) {
    let machine = unit.machine;
    w.line(format!(
        "void {}::transitionToState(StateMachineStates newState)",
        class
    ));
    w.open("{");
    w.open("if (m_currentState == newState) {");
    w.line("return;");
    w.close("}");
    for step in TRANSITION_SEQUENCE {
        match step {
            // Guards are evaluated at the call site.
            TransitionStep::EvaluateGuard => {}
            TransitionStep::Log => w.line(format!(
                "{};",
                unit.binding.log_event(
                    &machine.transition_event,
                    "getStateName(m_currentState)",
                    "getStateName(newState)"
                )
            )),
            TransitionStep::Telemetry => w.line(format!(
                "{};",
                unit.binding
                    .telemetry(&machine.telemetry_channel, "getStateName(newState)")
            )),
            TransitionStep::Commit => w.line("m_currentState = newState;"),
        }
    }
    w.close("}");
    w.blank();
}

fn render_state_names(w: &mut SourceWriter, machine: &ComponentStateMachine, class: &str) {
    w.line(format!(
        "const char* {}::getStateName(StateMachineStates state)",
        class
    ));
    w.open("{");
    w.open("switch (state) {");
    for state in &machine.states {
        w.line(format!("case {}: return {};", state.constant, cpp_string(&state.ident)));
    }
    w.line(format!(
        "default: return {};",
        cpp_string(UNKNOWN_STATE)
    ));
    w.close("}");
    w.close("}");
    w.blank();
}

fn render_activity(w: &mut SourceWriter, class: &str, activity: &CompiledActivity) {
    w.line(activity_signature(activity, &format!("{}::", class)));
    w.open("{");
    w.line(format!("// Activity: {}", activity.raw));
    for statement in &activity.statements {
        render_statement(w, statement);
    }
    w.close("}");
    w.blank();
}

fn render_statement(w: &mut SourceWriter, statement: &Statement) {
    match statement {
        Statement::Receive {
            parameter,
            variable,
            ty,
            copy,
            ..
        } => {
            if *copy {
                w.line(format!("{} {} = {};", cpp_type(ty), variable, parameter));
            }
        }
        Statement::CreateObject {
            variable, record, ..
        } => {
            w.line(format!("{} {};", record, variable));
        }
        Statement::Literal {
            variable, value, ..
        } => {
            let scalar = match value {
                Value::Number(_) => ScalarType::Float,
                Value::Bool(_) => ScalarType::Bool,
            };
            w.line(format!(
                "{} {} = {};",
                cpp_scalar(scalar),
                variable,
                cpp_literal(*value)
            ));
        }
        Statement::ReadFeature {
            variable,
            object,
            attribute,
            scalar,
            ..
        } => {
            w.line(format!(
                "{} {} = {}.{};",
                cpp_scalar(*scalar),
                variable,
                object,
                attribute
            ));
        }
        Statement::WriteFeature {
            object,
            attribute,
            value,
            ..
        } => {
            w.line(format!("{}.{} = {};", object, attribute, value));
        }
        Statement::Opaque {
            node,
            locals,
            body,
            exports,
        } => {
            for (outer, _, scalar) in exports {
                w.line(format!(
                    "{} {} = {};",
                    cpp_scalar(*scalar),
                    outer,
                    cpp_literal(scalar.zero())
                ));
            }
            w.open(format!("{{ // {}", node));
            for local in locals {
                let init = match &local.source {
                    Some(source) => source.clone(),
                    None => cpp_literal(local.scalar.zero()),
                };
                w.line(format!("{} {} = {};", cpp_scalar(local.scalar), local.name, init));
            }
            for line in body {
                w.line(line);
            }
            for (outer, local, _) in exports {
                w.line(format!("{} = {};", outer, local));
            }
            w.close("}");
        }
        Statement::Call {
            variable,
            method,
            arguments,
            ..
        } => {
            let call = format!("{}({})", method, arguments.iter().join(", "));
            match variable {
                Some((name, ty)) => w.line(format!("{} {} = {};", cpp_type(ty), name, call)),
                None => w.line(format!("{};", call)),
            }
        }
        Statement::Fork { node, branches } => {
            w.line(format!("// fork {}: {}", node, branches.join(", ")));
        }
        Statement::Join { node, inputs } => {
            w.line(format!("// join {}: {}", node, inputs.join(", ")));
        }
        Statement::Return { variable, .. } => {
            w.line(format!("return {};", variable));
        }
    }
}
