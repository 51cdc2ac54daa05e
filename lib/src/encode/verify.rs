use crate::decode::code::read_instructions;
use crate::decode::constants::Pool;
use crate::encode::flow::{max_stack, FlowError};
use crate::jvm::class_file::{
    Attribute, AttributeLike, BootstrapMethods, ClassFile, Code, ConstantsReader, StackMapFrame,
    StackMapTable, VerificationTypeInfo,
};
use crate::jvm::opcodes;
use crate::jvm::Error;
use crate::model::Instruction;

/// Re-read class file bytes and check that every method body is structurally sound
///
/// The checks cover what the encoder itself computes: jump targets land on instructions, stack
/// depths agree on every path and fit `max_stack`, locals fit `max_locals`, loaded constants
/// match their opcode, and stack map frames sit on increasing instruction offsets.
pub fn verify(bytes: &[u8]) -> Result<(), Error> {
    let class_file = ClassFile::parse(bytes)?;
    let class_name = class_file.name()?.to_owned();
    log::debug!("verifying class {}", class_name);
    verify_class(&class_file).map_err(|err| err.in_class(&class_name))
}

fn find<'a, A: AttributeLike>(
    class_file: &ClassFile,
    attributes: &'a [Attribute],
) -> Result<Vec<&'a Attribute>, Error> {
    let mut found = vec![];
    for attribute in attributes {
        if class_file.constants.utf8(attribute.name_index)? == A::NAME {
            found.push(attribute);
        }
    }
    Ok(found)
}

fn verify_class(class_file: &ClassFile) -> Result<(), Error> {
    let bootstrap_methods = match find::<BootstrapMethods>(class_file, &class_file.attributes)?.first() {
        None => vec![],
        Some(attribute) => attribute.parse::<BootstrapMethods>()?.0,
    };
    let pool = Pool {
        constants: &class_file.constants,
        bootstrap_methods: &bootstrap_methods,
    };

    for method in &class_file.methods {
        let method_id = format!(
            "{}{}",
            pool.utf8(method.name_index)?,
            pool.utf8(method.descriptor_index)?
        );
        for attribute in find::<Code>(class_file, &method.attributes)? {
            let code = attribute.parse::<Code>()?;
            let frames = match find::<StackMapTable>(class_file, &code.attributes)?.first() {
                None => vec![],
                Some(attribute) => attribute.parse::<StackMapTable>()?.0,
            };
            MethodCheck {
                method: &method_id,
                pool: &pool,
                code: &code,
            }
            .run(&frames)?;
        }
    }
    Ok(())
}

struct MethodCheck<'a> {
    method: &'a str,
    pool: &'a Pool<'a>,
    code: &'a Code,
}

impl<'a> MethodCheck<'a> {
    fn fail(&self, index: usize, message: impl Into<String>) -> Error {
        Error::Verification {
            method: self.method.to_owned(),
            index,
            message: message.into(),
        }
    }

    fn run(&self, frames: &[StackMapFrame]) -> Result<(), Error> {
        let bytes = &self.code.code_array.0;
        let code_len = bytes.len() as u32;
        if bytes.is_empty() {
            return Err(self.fail(0, "code is empty"));
        }
        let instructions = read_instructions(bytes, self.pool)?;
        let index_of = |offset: u32| -> Option<usize> {
            instructions
                .binary_search_by_key(&offset, |(pc, _)| *pc)
                .ok()
        };

        for (index, (pc, insn)) in instructions.iter().enumerate() {
            for target in insn.targets() {
                if index_of(*target).is_none() {
                    let msg = format!("jump target {} is not an instruction", target);
                    return Err(self.fail(index, msg));
                }
            }
            self.check_instruction(index, bytes[*pc as usize], insn)?;
        }

        let mut handlers = vec![];
        for handler in &self.code.exception_table {
            let (start, end) = (handler.start_pc as u32, handler.end_pc as u32);
            let index = index_of(start).unwrap_or(0);
            let end_ok = end == code_len || index_of(end).is_some();
            if index_of(start).is_none() || !end_ok || start >= end {
                let msg = format!("invalid exception handler range {}..{}", start, end);
                return Err(self.fail(index, msg));
            }
            if index_of(handler.handler_pc as u32).is_none() {
                let msg = format!("exception handler {} is not an instruction", handler.handler_pc);
                return Err(self.fail(index, msg));
            }
            handlers.push(handler.handler_pc as u32);
        }

        let depth = max_stack(&instructions, &handlers)
            .map_err(|FlowError { index, message }| self.fail(index, message))?;
        if depth > self.code.max_stack {
            let msg = format!(
                "stack reaches {} slots but max_stack is {}",
                depth, self.code.max_stack
            );
            return Err(self.fail(0, msg));
        }

        let mut previous: Option<u32> = None;
        for frame in frames {
            let offset = match previous {
                None => frame.offset_delta() as u32,
                Some(previous) => previous + frame.offset_delta() as u32 + 1,
            };
            previous = Some(offset);
            let index = index_of(offset).ok_or_else(|| {
                let at = instructions.partition_point(|(pc, _)| *pc < offset);
                self.fail(at, format!("stack map frame at {} is not on an instruction", offset))
            })?;
            for info in frame_types(frame) {
                if let VerificationTypeInfo::Uninitialized(new_offset) = info {
                    let is_new = index_of(*new_offset as u32).map_or(false, |new_index| {
                        instructions[new_index].1.opcode() == opcodes::NEW
                    });
                    if !is_new {
                        let msg = format!("uninitialized type at {} is not a new", new_offset);
                        return Err(self.fail(index, msg));
                    }
                }
            }
        }
        Ok(())
    }

    fn check_local(&self, index: usize, used: usize) -> Result<(), Error> {
        if used > self.code.max_locals as usize {
            let msg = format!(
                "local slot {} is beyond max_locals {}",
                used - 1,
                self.code.max_locals
            );
            return Err(self.fail(index, msg));
        }
        Ok(())
    }

    fn check_instruction(&self, index: usize, raw: u8, insn: &Instruction<u32>) -> Result<(), Error> {
        match insn {
            Instruction::Ldc(constant) => {
                let wide = constant.width() == 2;
                if wide != (raw == opcodes::LDC2_W) {
                    let name = opcodes::mnemonic(raw).unwrap_or("ldc");
                    let msg = format!("{} cannot load {:?}", name, constant);
                    return Err(self.fail(index, msg));
                }
            }
            Instruction::Var { opcode, index: var } => {
                let used = *var as usize + opcodes::local_width(*opcode) as usize;
                self.check_local(index, used)?;
            }
            Instruction::IInc { index: var, .. } => self.check_local(index, *var as usize + 1)?,
            Instruction::Int {
                opcode: opcodes::NEWARRAY,
                operand,
            } if !(4..=11).contains(operand) => {
                return Err(self.fail(index, format!("invalid array type {}", operand)));
            }
            Instruction::Type {
                opcode: opcodes::NEW,
                class,
            } if class.starts_with('[') => {
                return Err(self.fail(index, format!("new cannot create array {}", class)));
            }
            Instruction::Method {
                opcode: opcodes::INVOKEINTERFACE,
                interface: false,
                owner,
                name,
                ..
            } => {
                let msg = format!("invokeinterface on class method {}.{}", owner, name);
                return Err(self.fail(index, msg));
            }
            Instruction::LookupSwitch { keys, .. } => {
                if keys.windows(2).any(|pair| pair[0] >= pair[1]) {
                    return Err(self.fail(index, "lookupswitch keys are not sorted"));
                }
            }
            Instruction::MultiANewArray {
                descriptor,
                dimensions,
            } => {
                let depth = descriptor.chars().take_while(|c| *c == '[').count();
                if depth < *dimensions as usize {
                    let msg = format!("{} has fewer than {} dimensions", descriptor, dimensions);
                    return Err(self.fail(index, msg));
                }
            }
            _ => (),
        }
        Ok(())
    }
}

fn frame_types(frame: &StackMapFrame) -> Vec<&VerificationTypeInfo> {
    match frame {
        StackMapFrame::SameLocalsNoStack { .. } | StackMapFrame::ChopLocalsNoStack { .. } => vec![],
        StackMapFrame::SameLocalsOneStack { stack, .. } => vec![stack],
        StackMapFrame::AppendLocalsNoStack { locals, .. } => locals.iter().collect(),
        StackMapFrame::Full { locals, stack, .. } => locals.iter().chain(stack).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::write_class;
    use crate::jvm::opcodes::*;
    use crate::jvm::MethodAccessFlags;
    use crate::model::{Class, Entry, Method};

    fn class_with(body: Vec<Instruction>) -> ClassFile {
        let mut class = Class::new("Check", Some("java/lang/Object"));
        let mut method = Method::new(MethodAccessFlags::STATIC, "run", "()V");
        method.body = body.into_iter().map(Entry::Instruction).collect();
        class.methods.push(method);
        write_class(&class, None).unwrap()
    }

    #[test]
    fn written_code_passes() {
        let class_file = class_with(vec![
            Instruction::Simple(ICONST_1),
            Instruction::Var {
                opcode: ISTORE,
                index: 0,
            },
            Instruction::Simple(RETURN),
        ]);
        verify(&class_file.to_bytes().unwrap()).unwrap();
    }

    #[test]
    fn max_stack_too_small() {
        let mut class_file = class_with(vec![
            Instruction::Simple(ICONST_1),
            Instruction::Simple(POP),
            Instruction::Simple(RETURN),
        ]);
        let method = &mut class_file.methods[0];
        let mut code = method.attributes[0].parse::<Code>().unwrap();
        code.max_stack = 0;
        let mut info = vec![];
        crate::jvm::class_file::Serialize::serialize(&code, &mut info).unwrap();
        method.attributes[0].info = info;

        match verify(&class_file.to_bytes().unwrap()) {
            Err(Error::Verification { method, message, .. }) => {
                assert_eq!(method, "run()V");
                assert!(message.contains("max_stack"), "{}", message);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn locals_beyond_max() {
        let mut class_file = class_with(vec![
            Instruction::Simple(LCONST_0),
            Instruction::Var {
                opcode: LSTORE,
                index: 0,
            },
            Instruction::Simple(RETURN),
        ]);
        let method = &mut class_file.methods[0];
        let mut code = method.attributes[0].parse::<Code>().unwrap();
        code.max_locals = 1;
        let mut info = vec![];
        crate::jvm::class_file::Serialize::serialize(&code, &mut info).unwrap();
        method.attributes[0].info = info;

        match verify(&class_file.to_bytes().unwrap()) {
            Err(Error::Verification { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unsorted_lookupswitch() {
        let class_file = {
            let mut class = Class::new("Check", Some("java/lang/Object"));
            let mut method = Method::new(MethodAccessFlags::STATIC, "run", "(I)V");
            method.body = vec![
                Entry::Instruction(Instruction::Var {
                    opcode: ILOAD,
                    index: 0,
                }),
                Entry::Instruction(Instruction::LookupSwitch {
                    default: crate::model::Label(0),
                    keys: vec![5, 1],
                    targets: vec![crate::model::Label(0), crate::model::Label(0)],
                }),
                Entry::Label(crate::model::Label(0)),
                Entry::Instruction(Instruction::Simple(RETURN)),
            ];
            class.methods.push(method);
            write_class(&class, None).unwrap()
        };
        let err = verify(&class_file.to_bytes().unwrap()).unwrap_err();
        assert!(err.to_string().contains("lookupswitch"), "{}", err);
    }
}
