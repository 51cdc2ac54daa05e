use crate::jvm::opcodes;
use crate::jvm::{FieldType, MethodDescriptor, ParseDescriptor};
use crate::model::Instruction;
use crate::util::Width;

/// Problem found while following the control flow of a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowError {
    /// Index of the offending instruction
    pub index: usize,
    pub message: String,
}

fn field_width(descriptor: &str) -> Result<u16, String> {
    FieldType::parse(descriptor)
        .map(|typ| typ.width() as u16)
        .map_err(|err| format!("invalid field descriptor '{}': {}", descriptor, err))
}

fn method_descriptor(descriptor: &str) -> Result<MethodDescriptor, String> {
    MethodDescriptor::parse(descriptor)
        .map_err(|err| format!("invalid method descriptor '{}': {}", descriptor, err))
}

/// Number of stack slots popped and pushed by an instruction
///
/// `jsr` is counted as pushing its return address.
pub fn stack_effect<L>(insn: &Instruction<L>) -> Result<(u16, u16), String> {
    use crate::jvm::opcodes::*;
    let effect = match insn {
        Instruction::Simple(opcode) => simple_stack_effect(*opcode)
            .map(|(pop, push)| (pop as u16, push as u16))
            .ok_or_else(|| format!("opcode {} takes operands", opcode))?,
        Instruction::Int { opcode, .. } => match *opcode {
            NEWARRAY => (1, 1),
            _ => (0, 1),
        },
        Instruction::Var { opcode, .. } => match *opcode {
            RET => (0, 0),
            op if is_load(op) => (0, local_width(op)),
            op => (local_width(op), 0),
        },
        Instruction::IInc { .. } => (0, 0),
        Instruction::Type { opcode, .. } => match *opcode {
            NEW => (0, 1),
            _ => (1, 1),
        },
        Instruction::Field {
            opcode, descriptor, ..
        } => {
            let width = field_width(descriptor)?;
            match *opcode {
                GETSTATIC => (0, width),
                PUTSTATIC => (width, 0),
                GETFIELD => (1, width),
                _ => (1 + width, 0),
            }
        }
        Instruction::Method {
            opcode, descriptor, ..
        } => {
            let desc = method_descriptor(descriptor)?;
            let pop = desc.parameter_length(*opcode != INVOKESTATIC);
            (pop as u16, desc.return_length() as u16)
        }
        Instruction::InvokeDynamic { descriptor, .. } => {
            let desc = method_descriptor(descriptor)?;
            (desc.parameter_length(false) as u16, desc.return_length() as u16)
        }
        Instruction::Jump { opcode, .. } => match *opcode {
            GOTO => (0, 0),
            JSR => (0, 1),
            IFEQ..=IFLE | IFNULL | IFNONNULL => (1, 0),
            _ => (2, 0),
        },
        Instruction::Ldc(constant) => (0, constant.width()),
        Instruction::TableSwitch { .. } | Instruction::LookupSwitch { .. } => (1, 0),
        Instruction::MultiANewArray { dimensions, .. } => (*dimensions as u16, 1),
    };
    Ok(effect)
}

/// Compute the maximum operand stack depth of laid out code
///
/// Instructions are keyed by offset and jump to offsets. Exception handlers start with the thrown
/// exception on the stack. Every path reaching an instruction must agree on the stack depth.
pub fn max_stack(instructions: &[(u32, Instruction<u32>)], handlers: &[u32]) -> Result<u16, FlowError> {
    let index_of = |offset: u32, from: usize| -> Result<usize, FlowError> {
        instructions
            .binary_search_by_key(&offset, |(pc, _)| *pc)
            .map_err(|_| FlowError {
                index: from,
                message: format!("offset {} is not an instruction boundary", offset),
            })
    };

    let mut depths: Vec<Option<u16>> = vec![None; instructions.len()];
    let mut worklist: Vec<usize> = vec![];
    let mut max = 0u16;

    let reach = |depths: &mut Vec<Option<u16>>,
                     worklist: &mut Vec<usize>,
                     index: usize,
                     depth: u16,
                     from: usize|
     -> Result<(), FlowError> {
        match depths[index] {
            None => {
                depths[index] = Some(depth);
                worklist.push(index);
                Ok(())
            }
            Some(known) if known == depth => Ok(()),
            Some(known) => Err(FlowError {
                index: from,
                message: format!(
                    "inconsistent stack depth at offset {}: {} versus {}",
                    instructions[index].0, known, depth
                ),
            }),
        }
    };

    if !instructions.is_empty() {
        reach(&mut depths, &mut worklist, 0, 0, 0)?;
    }
    for handler in handlers {
        let index = index_of(*handler, 0)?;
        reach(&mut depths, &mut worklist, index, 1, index)?;
        max = max.max(1);
    }

    while let Some(index) = worklist.pop() {
        let (_, insn) = &instructions[index];
        let depth = depths[index].unwrap_or(0);
        let (pop, push) = stack_effect(insn).map_err(|message| FlowError { index, message })?;
        let after = depth.checked_sub(pop).ok_or_else(|| FlowError {
            index,
            message: format!("stack underflow: {} slots needed, {} available", pop, depth),
        })?;
        let after = after.checked_add(push).ok_or_else(|| FlowError {
            index,
            message: "stack overflow".to_owned(),
        })?;
        max = max.max(after);

        let opcode = insn.opcode();
        for target in insn.targets() {
            let target_index = index_of(*target, index)?;
            reach(&mut depths, &mut worklist, target_index, after, index)?;
        }
        if !opcodes::ends_flow(opcode) {
            // `jsr` returns with its return address popped
            let next_depth = if opcode == opcodes::JSR { depth } else { after };
            if index + 1 >= instructions.len() {
                return Err(FlowError {
                    index,
                    message: "execution falls off the end of the code".to_owned(),
                });
            }
            reach(&mut depths, &mut worklist, index + 1, next_depth, index)?;
        }
    }
    Ok(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::opcodes::*;
    use crate::model::Constant;

    #[test]
    fn invocation_effects() {
        let insn: Instruction = Instruction::Method {
            opcode: INVOKEVIRTUAL,
            owner: "java/io/PrintStream".into(),
            name: "println".into(),
            descriptor: "(Ljava/lang/String;)V".into(),
            interface: false,
        };
        assert_eq!(stack_effect(&insn), Ok((2, 0)));

        let insn: Instruction = Instruction::Method {
            opcode: INVOKESTATIC,
            owner: "java/lang/Math".into(),
            name: "max".into(),
            descriptor: "(JJ)J".into(),
            interface: false,
        };
        assert_eq!(stack_effect(&insn), Ok((4, 2)));

        let insn: Instruction = Instruction::Field {
            opcode: PUTFIELD,
            owner: "Foo".into(),
            name: "x".into(),
            descriptor: "D".into(),
        };
        assert_eq!(stack_effect(&insn), Ok((3, 0)));
    }

    #[test]
    fn hello_world_depth() {
        let code = vec![
            (
                0,
                Instruction::Field {
                    opcode: GETSTATIC,
                    owner: "java/lang/System".into(),
                    name: "out".into(),
                    descriptor: "Ljava/io/PrintStream;".into(),
                },
            ),
            (3, Instruction::Ldc(Constant::String("Hello".into()))),
            (
                5,
                Instruction::Method {
                    opcode: INVOKEVIRTUAL,
                    owner: "java/io/PrintStream".into(),
                    name: "println".into(),
                    descriptor: "(Ljava/lang/String;)V".into(),
                    interface: false,
                },
            ),
            (8, Instruction::Simple(RETURN)),
        ];
        assert_eq!(max_stack(&code, &[]), Ok(2));
    }

    #[test]
    fn branches_must_agree() {
        let code = vec![
            (0, Instruction::Simple(ICONST_0)),
            (1, Instruction::Jump { opcode: IFEQ, target: 5 }),
            (4, Instruction::Simple(ICONST_1)),
            (5, Instruction::Simple(RETURN)),
        ];
        let err = max_stack(&code, &[]).unwrap_err();
        assert!(err.message.contains("inconsistent stack depth"), "{}", err.message);
    }

    #[test]
    fn underflow_and_fall_off() {
        let code = vec![(0, Instruction::Simple(POP))];
        assert_eq!(max_stack(&code, &[]).unwrap_err().index, 0);

        let code = vec![(0, Instruction::Simple(NOP))];
        let err = max_stack(&code, &[]).unwrap_err();
        assert!(err.message.contains("falls off"));
    }

    #[test]
    fn handlers_start_with_exception() {
        let code = vec![
            (0, Instruction::Simple(RETURN)),
            (1, Instruction::Simple(ATHROW)),
        ];
        assert_eq!(max_stack(&code, &[1]), Ok(1));
    }
}
