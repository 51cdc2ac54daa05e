//! Human readable disassembly, embedded into IR documents as documentation

use crate::jvm::opcodes;
use crate::model::{Class, Constant, Entry, Instruction, Method};
use std::fmt::Write;
use std::str::FromStr;

/// What to put into the `<listing>` element
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Listing {
    /// No listing at all
    #[default]
    Omitted,

    /// One line naming the class and counting its members
    Summary,

    /// Full disassembly
    Full,
}

impl FromStr for Listing {
    type Err = String;

    fn from_str(s: &str) -> Result<Listing, String> {
        match s {
            "omitted" | "none" => Ok(Listing::Omitted),
            "summary" => Ok(Listing::Summary),
            "full" => Ok(Listing::Full),
            other => Err(format!("unknown listing '{}'", other)),
        }
    }
}

impl Listing {
    pub fn render(self, class: &Class) -> Option<String> {
        match self {
            Listing::Omitted => None,
            Listing::Summary => Some(summary(class)),
            Listing::Full => Some(full(class)),
        }
    }
}

fn plural(count: usize, word: &str) -> String {
    match count {
        1 => format!("1 {}", word),
        n => format!("{} {}s", n, word),
    }
}

pub fn summary(class: &Class) -> String {
    let instructions: usize = class.methods.iter().map(|m| m.instructions().count()).sum();
    format!(
        "class {} (version {}): {}, {}, {}",
        class.name,
        class.version,
        plural(class.fields.len(), "field"),
        plural(class.methods.len(), "method"),
        plural(instructions, "instruction"),
    )
}

pub fn full(class: &Class) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "class {} version {} access 0x{:04x}",
        class.name,
        class.version,
        class.access_flags.bits()
    );
    if let Some(super_class) = &class.super_class {
        let _ = write!(out, " extends {}", super_class);
    }
    out.push('\n');
    for interface in &class.interfaces {
        let _ = writeln!(out, "  implements {}", interface);
    }
    for field in &class.fields {
        let _ = writeln!(
            out,
            "  field {} {} access 0x{:04x}",
            field.name,
            field.descriptor,
            field.access_flags.bits()
        );
    }
    for method in &class.methods {
        method_listing(&mut out, method);
    }
    out
}

fn method_listing(out: &mut String, method: &Method) {
    let _ = writeln!(
        out,
        "  method {}{} access 0x{:04x}",
        method.name,
        method.descriptor,
        method.access_flags.bits()
    );
    for entry in &method.body {
        let _ = match entry {
            Entry::Instruction(insn) => writeln!(out, "    {}", describe(insn)),
            Entry::Label(label) => writeln!(out, "   {}:", label),
            Entry::Line(line) => writeln!(out, "    line {}", line),
            Entry::TryCatch {
                start,
                end,
                handler,
                catch_type,
            } => writeln!(
                out,
                "    try {} {} catch {} -> {}",
                start,
                end,
                catch_type.as_deref().unwrap_or("*"),
                handler
            ),
            Entry::LocalVariable(var) => writeln!(
                out,
                "    local {} {} {} {}..{}",
                var.index, var.name, var.descriptor, var.start, var.end
            ),
            Entry::Frame(frame) => writeln!(out, "    frame {:?}", frame),
        };
    }
}

fn constant(constant: &Constant) -> String {
    match constant {
        Constant::Int(i) => i.to_string(),
        Constant::Long(l) => format!("{}L", l),
        Constant::Float(f) => format!("{}F", f),
        Constant::Double(d) => format!("{}D", d),
        Constant::String(s) => format!("{:?}", s),
        Constant::Class(class) => format!("{}.class", class),
        Constant::MethodType(descriptor) => descriptor.clone(),
        Constant::MethodHandle(handle) => {
            format!("{}.{}{}", handle.owner, handle.name, handle.descriptor)
        }
        Constant::Dynamic(dynamic) => format!("{} {}", dynamic.name, dynamic.descriptor),
    }
}

/// Instruction as `mnemonic(operand, operand)`
pub fn describe(insn: &Instruction) -> String {
    let mnemonic = opcodes::mnemonic(insn.opcode()).unwrap_or("?");
    let operands: Vec<String> = match insn {
        Instruction::Simple(_) => vec![],
        Instruction::Int { operand, .. } => vec![operand.to_string()],
        Instruction::Var { index, .. } => vec![index.to_string()],
        Instruction::IInc { index, increment } => vec![index.to_string(), increment.to_string()],
        Instruction::Type { class, .. } => vec![class.clone()],
        Instruction::Field {
            owner,
            name,
            descriptor,
            ..
        }
        | Instruction::Method {
            owner,
            name,
            descriptor,
            ..
        } => vec![owner.clone(), name.clone(), descriptor.clone()],
        Instruction::InvokeDynamic {
            name,
            descriptor,
            bootstrap,
            ..
        } => vec![
            name.clone(),
            descriptor.clone(),
            format!("{}.{}", bootstrap.owner, bootstrap.name),
        ],
        Instruction::Jump { target, .. } => vec![target.to_string()],
        Instruction::Ldc(value) => vec![constant(value)],
        Instruction::TableSwitch {
            min,
            max,
            default,
            targets,
        } => {
            let mut operands = vec![format!("{}..{}", min, max), default.to_string()];
            operands.extend(targets.iter().map(ToString::to_string));
            operands
        }
        Instruction::LookupSwitch {
            default,
            keys,
            targets,
        } => {
            let mut operands = vec![default.to_string()];
            operands.extend(
                keys.iter()
                    .zip(targets)
                    .map(|(key, target)| format!("{}: {}", key, target)),
            );
            operands
        }
        Instruction::MultiANewArray {
            descriptor,
            dimensions,
        } => vec![descriptor.clone(), dimensions.to_string()],
    };
    format!("{}({})", mnemonic, operands.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::opcodes::*;
    use crate::jvm::MethodAccessFlags;
    use crate::model::Label;

    fn hello() -> Class {
        let mut class = Class::new("demo/Hello", Some("java/lang/Object"));
        let mut main = Method::new(
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            "main",
            "([Ljava/lang/String;)V",
        );
        main.body = vec![
            Entry::Label(Label(0)),
            Entry::Line(3),
            Entry::Instruction(Instruction::Ldc(Constant::String("Hi".into()))),
            Entry::Instruction(Instruction::Simple(POP)),
            Entry::Instruction(Instruction::Simple(RETURN)),
        ];
        class.methods.push(main);
        class
    }

    #[test]
    fn describes_instructions() {
        let insn = Instruction::Method {
            opcode: INVOKESPECIAL,
            owner: "java/lang/Object".into(),
            name: "<init>".into(),
            descriptor: "()V".into(),
            interface: false,
        };
        assert_eq!(describe(&insn), "invokespecial(java/lang/Object, <init>, ()V)");
        assert_eq!(describe(&Instruction::Simple(RETURN)), "return()");
        let jump = Instruction::Jump {
            opcode: GOTO,
            target: Label(2),
        };
        assert_eq!(describe(&jump), "goto(L2)");
    }

    #[test]
    fn listings() {
        let class = hello();
        assert_eq!(Listing::Omitted.render(&class), None);
        assert_eq!(
            Listing::Summary.render(&class).unwrap(),
            "class demo/Hello (version 52.0): 0 fields, 1 method, 3 instructions"
        );
        let full = Listing::Full.render(&class).unwrap();
        assert!(full.contains("method main([Ljava/lang/String;)V"), "{}", full);
        assert!(full.contains("ldc(\"Hi\")"), "{}", full);
        assert_eq!("summary".parse::<Listing>(), Ok(Listing::Summary));
        assert!("verbose".parse::<Listing>().is_err());
    }
}
