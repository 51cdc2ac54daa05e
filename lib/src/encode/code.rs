use crate::encode::constants::Constants;
use crate::encode::flow::{self, FlowError};
use crate::jvm::class_file::{
    BytecodeArray, Code, ExceptionHandler, LineNumber, LineNumberTable, LocalVariableTable,
    LocalVariableTypeTable, StackMapFrame, StackMapTable, VerificationTypeInfo,
};
use crate::jvm::opcodes::{self, Family};
use crate::jvm::{class_file, Error, FieldType, MethodDescriptor, ParseDescriptor};
use crate::model::{Entry, Frame, Instruction, Label, Method, VerificationType};
use crate::util::Width;
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::collections::{HashMap, HashSet};

/// Maximum length of a code array
const MAX_CODE_LENGTH: usize = 65535;

/// Branch offset waiting for its target label to be placed
struct Fixup {
    /// Offset of the branching instruction
    pc: u32,

    /// Position of the offset bytes in the code array
    at: usize,

    /// 4-byte offset (switches) rather than a 2-byte one
    wide: bool,
    label: Label,

    /// Index of the branching instruction
    index: usize,
}

/// Writes a method body into a `Code` attribute
///
/// Code is laid out choosing the shortest encoding of every instruction, then jump offsets are
/// patched in once all labels are placed. Jumps whose offset does not fit in 16 bits are marked
/// wide and the whole body is laid out again, until every offset fits: `goto` and `jsr` become
/// `goto_w` and `jsr_w`, and a conditional jump becomes its inverse skipping over a `goto_w`.
pub struct CodeWriter<'a> {
    constants: &'a mut Constants,
    method: &'a Method,
    is_static: bool,

    /// `name` followed by `descriptor`, for error messages
    method_id: String,
    code: Vec<u8>,
    labels: HashMap<Label, u32>,
    fixups: Vec<Fixup>,
    instructions: Vec<(u32, &'a Instruction)>,

    /// Indices of the jumps that need a 4-byte offset
    wide_jumps: HashSet<usize>,
}

impl<'a> CodeWriter<'a> {
    pub fn new(constants: &'a mut Constants, method: &'a Method) -> CodeWriter<'a> {
        CodeWriter {
            constants,
            method,
            is_static: method
                .access_flags
                .contains(crate::jvm::MethodAccessFlags::STATIC),
            method_id: format!("{}{}", method.name, method.descriptor),
            code: vec![],
            labels: HashMap::new(),
            fixups: vec![],
            instructions: vec![],
            wide_jumps: HashSet::new(),
        }
    }

    fn invalid(&self, index: usize, message: impl Into<String>) -> Error {
        Error::Verification {
            method: self.method_id.clone(),
            index,
            message: message.into(),
        }
    }

    fn pc(&self) -> u32 {
        self.code.len() as u32
    }

    fn offset(&self, label: Label, index: usize) -> Result<u32, Error> {
        self.labels
            .get(&label)
            .copied()
            .ok_or_else(|| self.invalid(index, format!("label {} is not placed in the body", label)))
    }

    pub fn write(mut self) -> Result<Code, Error> {
        let (lines, frames) = loop {
            let layout = self.layout()?;
            let overflowing = self.patch_jumps()?;
            if overflowing.is_empty() {
                break layout;
            }
            log::debug!(
                "widening {} jumps in method {}",
                overflowing.len(),
                self.method_id
            );
        };

        let exception_table = self.exception_table()?;
        let max_stack = self.max_stack(&exception_table)?;
        let max_locals = self.max_locals(&frames)?;

        let mut attributes = vec![];
        let code_len = self.pc();
        let line_numbers: Vec<LineNumber> = lines
            .into_iter()
            .filter_map(|(pc, line_number)| {
                if pc < code_len {
                    Some(LineNumber {
                        start_pc: pc as u16,
                        line_number,
                    })
                } else {
                    log::warn!("dropping line {} after the last instruction", line_number);
                    None
                }
            })
            .collect();
        if !line_numbers.is_empty() {
            let table = self.constants.pool.get_attribute(LineNumberTable(line_numbers))?;
            attributes.push(table);
        }
        let (locals, local_types) = self.local_variables()?;
        if !locals.is_empty() {
            attributes.push(self.constants.pool.get_attribute(LocalVariableTable(locals))?);
        }
        if !local_types.is_empty() {
            let table = LocalVariableTypeTable(local_types);
            attributes.push(self.constants.pool.get_attribute(table)?);
        }
        let stack_map = self.stack_map(&frames)?;
        if !stack_map.is_empty() {
            attributes.push(self.constants.pool.get_attribute(StackMapTable(stack_map))?);
        }

        Ok(Code {
            max_stack,
            max_locals,
            code_array: BytecodeArray(self.code),
            exception_table,
            attributes,
        })
    }

    /// Lay out the whole body, returning the lines and frames with their offsets
    #[allow(clippy::type_complexity)]
    fn layout(&mut self) -> Result<(Vec<(u32, u16)>, Vec<(u32, usize, &'a Frame)>), Error> {
        self.code.clear();
        self.labels.clear();
        self.fixups.clear();
        self.instructions.clear();

        let method = self.method;
        let mut lines = vec![];
        let mut frames = vec![];
        for entry in &method.body {
            let index = self.instructions.len();
            match entry {
                Entry::Label(label) => {
                    if self.labels.insert(*label, self.pc()).is_some() {
                        return Err(self.invalid(index, format!("label {} placed twice", label)));
                    }
                }
                Entry::Line(line) => lines.push((self.pc(), *line)),
                Entry::Frame(frame) => frames.push((self.pc(), index, frame)),
                Entry::Instruction(insn) => {
                    self.instructions.push((self.pc(), insn));
                    self.emit(insn, index)?;
                }
                Entry::TryCatch { .. } | Entry::LocalVariable(_) => (),
            }
        }

        if self.code.is_empty() {
            return Err(self.invalid(0, "method body has no instructions"));
        }
        if self.code.len() > MAX_CODE_LENGTH {
            return Err(Error::MethodCodeOverflow {
                method: self.method_id.clone(),
                size: self.code.len(),
            });
        }
        Ok((lines, frames))
    }

    fn check_family(&self, opcode: u8, family: Family, index: usize) -> Result<(), Error> {
        if opcodes::family(opcode) == Some(family) {
            Ok(())
        } else {
            let name = opcodes::mnemonic(opcode).unwrap_or("<invalid>");
            let msg = format!("opcode {} ({}) is not a {:?} instruction", opcode, name, family);
            Err(self.invalid(index, msg))
        }
    }

    fn jump(&mut self, label: Label, wide: bool, pc: u32, index: usize) {
        self.fixups.push(Fixup {
            pc,
            at: self.code.len(),
            wide,
            label,
            index,
        });
        let placeholder: &[u8] = if wide { &[0; 4] } else { &[0; 2] };
        self.code.extend_from_slice(placeholder);
    }

    fn pad(&mut self) {
        while self.code.len() % 4 != 0 {
            self.code.push(0);
        }
    }

    fn emit(&mut self, insn: &Instruction, index: usize) -> Result<(), Error> {
        use crate::jvm::opcodes::*;
        let pc = self.pc();
        match insn {
            Instruction::Simple(opcode) => {
                self.check_family(*opcode, Family::Simple, index)?;
                self.code.push(*opcode);
            }
            Instruction::Int { opcode, operand } => {
                self.check_family(*opcode, Family::Int, index)?;
                let operand = *operand;
                let in_range = match *opcode {
                    BIPUSH => i8::try_from(operand).is_ok(),
                    SIPUSH => i16::try_from(operand).is_ok(),
                    _ => (4..=11).contains(&operand),
                };
                if !in_range {
                    let msg = format!("operand {} out of range for {}", operand, opcode);
                    return Err(self.invalid(index, msg));
                }
                self.code.push(*opcode);
                match *opcode {
                    SIPUSH => self.code.write_i16::<BigEndian>(operand as i16)?,
                    _ => self.code.push(operand as u8),
                }
            }
            Instruction::Var { opcode, index: var } => {
                self.check_family(*opcode, Family::Var, index)?;
                let (opcode, var) = (*opcode, *var);
                if var <= 3 && opcode != RET {
                    let short = if is_load(opcode) {
                        ILOAD_0 + (opcode - ILOAD) * 4
                    } else {
                        ISTORE_0 + (opcode - ISTORE) * 4
                    };
                    self.code.push(short + var as u8);
                } else if var <= u8::MAX as u16 {
                    self.code.push(opcode);
                    self.code.push(var as u8);
                } else {
                    self.code.push(WIDE);
                    self.code.push(opcode);
                    self.code.write_u16::<BigEndian>(var)?;
                }
            }
            Instruction::IInc {
                index: var,
                increment,
            } => match (u8::try_from(*var), i8::try_from(*increment)) {
                (Ok(var), Ok(increment)) => {
                    self.code.push(IINC);
                    self.code.push(var);
                    self.code.write_i8(increment)?;
                }
                _ => {
                    self.code.push(WIDE);
                    self.code.push(IINC);
                    self.code.write_u16::<BigEndian>(*var)?;
                    self.code.write_i16::<BigEndian>(*increment)?;
                }
            },
            Instruction::Type { opcode, class } => {
                self.check_family(*opcode, Family::Type, index)?;
                let class = self.constants.pool.get_class(class)?;
                self.code.push(*opcode);
                self.code.write_u16::<BigEndian>(class.0 .0)?;
            }
            Instruction::Field {
                opcode,
                owner,
                name,
                descriptor,
            } => {
                self.check_family(*opcode, Family::Field, index)?;
                let field = self.constants.pool.get_field_ref(owner, name, descriptor)?;
                self.code.push(*opcode);
                self.code.write_u16::<BigEndian>(field.0)?;
            }
            Instruction::Method {
                opcode,
                owner,
                name,
                descriptor,
                interface,
            } => {
                self.check_family(*opcode, Family::Method, index)?;
                let method = self
                    .constants
                    .pool
                    .get_method_ref(owner, name, descriptor, *interface)?;
                self.code.push(*opcode);
                self.code.write_u16::<BigEndian>(method.0)?;
                if *opcode == INVOKEINTERFACE {
                    let count = MethodDescriptor::parse(descriptor)
                        .map_err(|err| self.invalid(index, err.to_string()))?
                        .parameter_length(true);
                    let count = u8::try_from(count)
                        .map_err(|_| self.invalid(index, "too many interface call arguments"))?;
                    self.code.push(count);
                    self.code.push(0);
                }
            }
            Instruction::InvokeDynamic {
                name,
                descriptor,
                bootstrap,
                arguments,
            } => {
                let call_site = self
                    .constants
                    .invoke_dynamic(name, descriptor, bootstrap, arguments)?;
                self.code.push(INVOKEDYNAMIC);
                self.code.write_u16::<BigEndian>(call_site.0)?;
                self.code.write_u16::<BigEndian>(0)?;
            }
            Instruction::Jump { opcode, target } => {
                self.check_family(*opcode, Family::Jump, index)?;
                let opcode = *opcode;
                if !self.wide_jumps.contains(&index) {
                    self.code.push(opcode);
                    self.jump(*target, false, pc, index);
                } else if let Some(wide) = opcodes::wide_jump(opcode) {
                    self.code.push(wide);
                    self.jump(*target, true, pc, index);
                } else {
                    let inverted = opcodes::inverted_jump(opcode)
                        .ok_or_else(|| self.invalid(index, "jump has no inverse"))?;
                    // Skip over the 3 bytes of this jump and the 5 of the `goto_w`
                    self.code.push(inverted);
                    self.code.write_i16::<BigEndian>(8)?;
                    let goto_pc = self.pc();
                    self.code.push(GOTO_W);
                    self.jump(*target, true, goto_pc, index);
                }
            }
            Instruction::Ldc(constant) => {
                let constant_index = self.constants.loadable(constant)?;
                if constant.width() == 2 {
                    self.code.push(LDC2_W);
                    self.code.write_u16::<BigEndian>(constant_index.0)?;
                } else if let Ok(small) = u8::try_from(constant_index.0) {
                    self.code.push(LDC);
                    self.code.push(small);
                } else {
                    self.code.push(LDC_W);
                    self.code.write_u16::<BigEndian>(constant_index.0)?;
                }
            }
            Instruction::TableSwitch {
                min,
                max,
                default,
                targets,
            } => {
                let expected = *max as i64 - *min as i64 + 1;
                if expected < 1 || targets.len() as i64 != expected {
                    let msg = format!(
                        "tableswitch from {} to {} has {} targets",
                        min,
                        max,
                        targets.len()
                    );
                    return Err(self.invalid(index, msg));
                }
                self.code.push(TABLESWITCH);
                self.pad();
                self.jump(*default, true, pc, index);
                self.code.write_i32::<BigEndian>(*min)?;
                self.code.write_i32::<BigEndian>(*max)?;
                for target in targets {
                    self.jump(*target, true, pc, index);
                }
            }
            Instruction::LookupSwitch {
                default,
                keys,
                targets,
            } => {
                if keys.len() != targets.len() {
                    let msg = format!("lookupswitch has {} keys but {} targets", keys.len(), targets.len());
                    return Err(self.invalid(index, msg));
                }
                self.code.push(LOOKUPSWITCH);
                self.pad();
                self.jump(*default, true, pc, index);
                self.code.write_i32::<BigEndian>(keys.len() as i32)?;
                for (key, target) in keys.iter().zip(targets) {
                    self.code.write_i32::<BigEndian>(*key)?;
                    self.jump(*target, true, pc, index);
                }
            }
            Instruction::MultiANewArray {
                descriptor,
                dimensions,
            } => {
                if *dimensions == 0 {
                    return Err(self.invalid(index, "multianewarray needs at least one dimension"));
                }
                let class = self.constants.pool.get_class(descriptor)?;
                self.code.push(MULTIANEWARRAY);
                self.code.write_u16::<BigEndian>(class.0 .0)?;
                self.code.push(*dimensions);
            }
        }
        Ok(())
    }

    /// Write jump offsets, returning the jumps whose offset does not fit
    fn patch_jumps(&mut self) -> Result<Vec<usize>, Error> {
        let fixups = std::mem::take(&mut self.fixups);
        let mut overflowing = vec![];
        for fixup in &fixups {
            let target = self.offset(fixup.label, fixup.index)?;
            let offset = target as i64 - fixup.pc as i64;
            let slot = &mut self.code[fixup.at..];
            if fixup.wide {
                let offset = i32::try_from(offset).map_err(|_| Error::BranchOffsetOverflow {
                    method: self.method_id.clone(),
                    offset,
                })?;
                BigEndian::write_i32(slot, offset);
            } else if let Ok(offset) = i16::try_from(offset) {
                BigEndian::write_i16(slot, offset);
            } else if self.wide_jumps.insert(fixup.index) {
                overflowing.push(fixup.index);
            } else {
                return Err(Error::BranchOffsetOverflow {
                    method: self.method_id.clone(),
                    offset,
                });
            }
        }
        self.fixups = fixups;
        Ok(overflowing)
    }

    fn exception_table(&mut self) -> Result<Vec<ExceptionHandler>, Error> {
        let method = self.method;
        let mut handlers = vec![];
        for entry in &method.body {
            if let Entry::TryCatch {
                start,
                end,
                handler,
                catch_type,
            } = entry
            {
                let index = self.instruction_at(*start);
                let start_pc = self.offset(*start, index)?;
                let end_pc = self.offset(*end, index)?;
                let handler_pc = self.offset(*handler, index)?;
                if start_pc >= end_pc {
                    let msg = format!("exception handler covers {}..{}", start_pc, end_pc);
                    return Err(self.invalid(index, msg));
                }
                let catch_type = match catch_type {
                    None => None,
                    Some(class) => Some(self.constants.pool.get_class(class)?),
                };
                handlers.push(ExceptionHandler {
                    start_pc: start_pc as u16,
                    end_pc: end_pc as u16,
                    handler_pc: handler_pc as u16,
                    catch_type,
                });
            }
        }
        Ok(handlers)
    }

    /// Index of the instruction at a label (for error messages)
    fn instruction_at(&self, label: Label) -> usize {
        let pc = self.labels.get(&label).copied().unwrap_or(0);
        self.instructions
            .partition_point(|(insn_pc, _)| *insn_pc < pc)
    }

    fn max_stack(&self, handlers: &[ExceptionHandler]) -> Result<u16, Error> {
        let mut resolved = Vec::with_capacity(self.instructions.len());
        for (index, (pc, insn)) in self.instructions.iter().enumerate() {
            let insn = (*insn)
                .clone()
                .map_labels(|label| self.offset(label, index))?;
            resolved.push((*pc, insn));
        }
        let handlers: Vec<u32> = handlers
            .iter()
            .map(|handler| handler.handler_pc as u32)
            .collect();
        flow::max_stack(&resolved, &handlers).map_err(|FlowError { index, message }| {
            self.invalid(index, message)
        })
    }

    fn max_locals(&self, frames: &[(u32, usize, &Frame)]) -> Result<u16, Error> {
        let descriptor = MethodDescriptor::parse(&self.method.descriptor).map_err(|err| {
            let msg = format!("invalid method descriptor '{}': {}", self.method.descriptor, err);
            self.invalid(0, msg)
        })?;
        let mut max = descriptor.parameter_length(!self.is_static);

        for (index, (_, insn)) in self.instructions.iter().enumerate() {
            let used = match insn {
                Instruction::Var { opcode, index: var } => {
                    *var as usize + opcodes::local_width(*opcode) as usize
                }
                Instruction::IInc { index: var, .. } => *var as usize + 1,
                _ => continue,
            };
            if used > u16::MAX as usize {
                return Err(self.invalid(index, "local variable index out of range"));
            }
            max = max.max(used);
        }
        for entry in &self.method.body {
            if let Entry::LocalVariable(local) = entry {
                let width = FieldType::parse(&local.descriptor).map_or(1, |typ| typ.width());
                max = max.max(local.index as usize + width);
            }
        }

        // Locals described by the frames, starting from the implicit initial frame
        let mut widths: Vec<usize> = vec![];
        if !self.is_static {
            widths.push(1);
        }
        widths.extend(descriptor.parameters.iter().map(|param| param.width()));
        for (_, index, frame) in frames {
            match frame {
                Frame::Same | Frame::SameLocals1StackItem(_) => (),
                Frame::Chop(k) => {
                    let k = *k as usize;
                    if k > widths.len() {
                        return Err(self.invalid(*index, "frame chops more locals than exist"));
                    }
                    widths.truncate(widths.len() - k);
                }
                Frame::Append(locals) => widths.extend(locals.iter().map(type_width)),
                Frame::Full { locals, .. } => {
                    widths = locals.iter().map(type_width).collect();
                }
            }
            max = max.max(widths.iter().sum());
        }

        u16::try_from(max).map_err(|_| self.invalid(0, "too many local variables"))
    }

    fn local_variables(
        &mut self,
    ) -> Result<(Vec<class_file::LocalVariable>, Vec<class_file::LocalVariable>), Error> {
        let mut locals = vec![];
        let mut local_types = vec![];
        let method = self.method;
        for entry in &method.body {
            if let Entry::LocalVariable(local) = entry {
                let index = self.instruction_at(local.start);
                let start = self.offset(local.start, index)?;
                let end = self.offset(local.end, index)?;
                if end < start {
                    let msg = format!("local variable {} ends before it starts", local.name);
                    return Err(self.invalid(index, msg));
                }
                let name_index = self.constants.pool.get_utf8(&local.name)?;
                let descriptor_index = self.constants.pool.get_utf8(&local.descriptor)?;
                locals.push(class_file::LocalVariable {
                    start_pc: start as u16,
                    length: (end - start) as u16,
                    name_index,
                    descriptor_index,
                    index: local.index,
                });
                if let Some(signature) = &local.signature {
                    local_types.push(class_file::LocalVariable {
                        start_pc: start as u16,
                        length: (end - start) as u16,
                        name_index,
                        descriptor_index: self.constants.pool.get_utf8(signature)?,
                        index: local.index,
                    });
                }
            }
        }
        Ok((locals, local_types))
    }

    fn stack_map(&mut self, frames: &[(u32, usize, &Frame)]) -> Result<Vec<StackMapFrame>, Error> {
        let code_len = self.pc();
        let mut previous: Option<u32> = None;
        let mut stack_map = Vec::with_capacity(frames.len());
        for (pc, index, frame) in frames {
            let (pc, index) = (*pc, *index);
            if pc >= code_len {
                return Err(self.invalid(index, "frame is not followed by an instruction"));
            }
            let offset_delta = match previous {
                None => pc,
                Some(previous) if pc > previous => pc - previous - 1,
                Some(_) => {
                    return Err(self.invalid(index, "frames must be at increasing offsets"));
                }
            } as u16;
            previous = Some(pc);

            let frame = match frame {
                Frame::Same => StackMapFrame::SameLocalsNoStack { offset_delta },
                Frame::SameLocals1StackItem(typ) => StackMapFrame::SameLocalsOneStack {
                    offset_delta,
                    stack: self.verification_type(typ, index)?,
                },
                Frame::Chop(chopped_k @ 1..=3) => StackMapFrame::ChopLocalsNoStack {
                    offset_delta,
                    chopped_k: *chopped_k,
                },
                Frame::Append(locals) if (1..=3).contains(&locals.len()) => {
                    StackMapFrame::AppendLocalsNoStack {
                        offset_delta,
                        locals: self.verification_types(locals, index)?,
                    }
                }
                Frame::Full { locals, stack } => StackMapFrame::Full {
                    offset_delta,
                    locals: self.verification_types(locals, index)?,
                    stack: self.verification_types(stack, index)?,
                },
                Frame::Chop(_) | Frame::Append(_) => {
                    return Err(self.invalid(index, "frames chop or append 1 to 3 locals"));
                }
            };
            stack_map.push(frame);
        }
        Ok(stack_map)
    }

    fn verification_types(
        &mut self,
        types: &[VerificationType],
        index: usize,
    ) -> Result<Vec<VerificationTypeInfo>, Error> {
        types
            .iter()
            .map(|typ| self.verification_type(typ, index))
            .collect()
    }

    fn verification_type(
        &mut self,
        typ: &VerificationType,
        index: usize,
    ) -> Result<VerificationTypeInfo, Error> {
        let info = match typ {
            VerificationType::Top => VerificationTypeInfo::Top,
            VerificationType::Integer => VerificationTypeInfo::Integer,
            VerificationType::Float => VerificationTypeInfo::Float,
            VerificationType::Double => VerificationTypeInfo::Double,
            VerificationType::Long => VerificationTypeInfo::Long,
            VerificationType::Null => VerificationTypeInfo::Null,
            VerificationType::UninitializedThis => VerificationTypeInfo::UninitializedThis,
            VerificationType::Object(class) => {
                VerificationTypeInfo::Object(self.constants.pool.get_class(class)?)
            }
            VerificationType::Uninitialized(label) => {
                VerificationTypeInfo::Uninitialized(self.offset(*label, index)? as u16)
            }
        };
        Ok(info)
    }
}

fn type_width(typ: &VerificationType) -> usize {
    match typ {
        VerificationType::Long | VerificationType::Double => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvm::class_file::{Attribute, ConstantsReader};
    use crate::jvm::opcodes::*;
    use crate::jvm::MethodAccessFlags;
    use crate::model::{Constant, LocalVariable};

    fn write(method: &Method) -> Result<(Code, Constants), Error> {
        let mut constants = Constants::default();
        let code = CodeWriter::new(&mut constants, method).write()?;
        Ok((code, constants))
    }

    fn static_method(descriptor: &str, body: Vec<Entry>) -> Method {
        let mut method = Method::new(MethodAccessFlags::STATIC, "test", descriptor);
        method.body = body;
        method
    }

    fn insn(insn: Instruction) -> Entry {
        Entry::Instruction(insn)
    }

    #[test]
    fn shortest_local_forms() {
        let method = static_method(
            "(I)V",
            vec![
                insn(Instruction::Var {
                    opcode: ILOAD,
                    index: 0,
                }),
                insn(Instruction::Var {
                    opcode: ISTORE,
                    index: 5,
                }),
                insn(Instruction::Var {
                    opcode: ALOAD,
                    index: 300,
                }),
                insn(Instruction::Simple(POP)),
                insn(Instruction::IInc {
                    index: 5,
                    increment: 1000,
                }),
                insn(Instruction::Simple(RETURN)),
            ],
        );
        let (code, _) = write(&method).unwrap();
        assert_eq!(
            code.code_array.0,
            vec![
                ILOAD_0, ISTORE, 5, WIDE, ALOAD, 1, 44, POP, WIDE, IINC, 0, 5, 0x03, 0xE8, RETURN
            ]
        );
        assert_eq!(code.max_stack, 1);
        assert_eq!(code.max_locals, 301);
    }

    #[test]
    fn backward_and_forward_jumps() {
        let method = static_method(
            "(I)V",
            vec![
                Entry::Label(Label(0)),
                insn(Instruction::Var {
                    opcode: ILOAD,
                    index: 0,
                }),
                insn(Instruction::Jump {
                    opcode: IFEQ,
                    target: Label(1),
                }),
                insn(Instruction::Jump {
                    opcode: GOTO,
                    target: Label(0),
                }),
                Entry::Label(Label(1)),
                insn(Instruction::Simple(RETURN)),
            ],
        );
        let (code, _) = write(&method).unwrap();
        assert_eq!(
            code.code_array.0,
            vec![ILOAD_0, IFEQ, 0, 6, GOTO, 0xFF, 0xFC, RETURN]
        );
    }

    #[test]
    fn missing_label() {
        let method = static_method(
            "()V",
            vec![insn(Instruction::Jump {
                opcode: GOTO,
                target: Label(7),
            })],
        );
        match write(&method) {
            Err(Error::Verification { method, index, .. }) => {
                assert_eq!(method, "test()V");
                assert_eq!(index, 0);
            }
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn far_jumps_are_widened() {
        let mut body = vec![insn(Instruction::Jump {
            opcode: GOTO,
            target: Label(0),
        })];
        body.extend((0..40000).map(|_| insn(Instruction::Simple(NOP))));
        body.push(Entry::Label(Label(0)));
        body.push(insn(Instruction::Simple(RETURN)));
        let (code, _) = write(&static_method("()V", body)).unwrap();
        assert_eq!(code.code_array.0[..5], [GOTO_W, 0, 0, 0x9C, 0x45]);
        assert_eq!(code.code_array.0.len(), 40006);
    }

    #[test]
    fn far_conditional_jumps_skip_over_goto_w() {
        let mut body = vec![
            insn(Instruction::Var {
                opcode: ILOAD,
                index: 0,
            }),
            insn(Instruction::Jump {
                opcode: IFEQ,
                target: Label(0),
            }),
        ];
        body.extend((0..40000).map(|_| insn(Instruction::Simple(NOP))));
        body.push(Entry::Label(Label(0)));
        body.push(insn(Instruction::Simple(RETURN)));
        let (code, _) = write(&static_method("(I)V", body)).unwrap();
        assert_eq!(
            code.code_array.0[..10],
            [ILOAD_0, IFNE, 0, 8, GOTO_W, 0, 0, 0x9C, 0x45, NOP]
        );
        assert_eq!(code.max_stack, 1);
    }

    #[test]
    fn near_jumps_stay_short_next_to_far_ones() {
        let mut body = vec![
            insn(Instruction::Jump {
                opcode: GOTO,
                target: Label(0),
            }),
            Entry::Label(Label(1)),
            insn(Instruction::Jump {
                opcode: GOTO,
                target: Label(1),
            }),
        ];
        body.extend((0..40000).map(|_| insn(Instruction::Simple(NOP))));
        body.push(Entry::Label(Label(0)));
        body.push(insn(Instruction::Simple(RETURN)));
        let (code, _) = write(&static_method("()V", body)).unwrap();
        assert_eq!(code.code_array.0[..8], [GOTO_W, 0, 0, 0x9C, 0x48, GOTO, 0, 0]);
    }

    #[test]
    fn code_too_long() {
        let mut body: Vec<Entry> = (0..70000).map(|_| insn(Instruction::Simple(NOP))).collect();
        body.push(insn(Instruction::Simple(RETURN)));
        match write(&static_method("()V", body)) {
            Err(Error::MethodCodeOverflow { size, .. }) => assert_eq!(size, 70001),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn wide_constants_use_ldc2_w() {
        let method = static_method(
            "()J",
            vec![
                insn(Instruction::Ldc(Constant::Long(1 << 40))),
                insn(Instruction::Simple(LRETURN)),
            ],
        );
        let (code, _) = write(&method).unwrap();
        assert_eq!(code.code_array.0, vec![LDC2_W, 0, 1, LRETURN]);
        assert_eq!(code.max_stack, 2);
        assert_eq!(code.max_locals, 0);
    }

    #[test]
    fn switch_padding() {
        let method = static_method(
            "(I)V",
            vec![
                insn(Instruction::Var {
                    opcode: ILOAD,
                    index: 0,
                }),
                insn(Instruction::LookupSwitch {
                    default: Label(0),
                    keys: vec![3],
                    targets: vec![Label(0)],
                }),
                Entry::Label(Label(0)),
                insn(Instruction::Simple(RETURN)),
            ],
        );
        let (code, _) = write(&method).unwrap();
        assert_eq!(
            code.code_array.0,
            vec![
                ILOAD_0,
                LOOKUPSWITCH,
                0,
                0,
                0,
                0,
                0,
                19,
                0,
                0,
                0,
                1,
                0,
                0,
                0,
                3,
                0,
                0,
                0,
                19,
                RETURN
            ]
        );
    }

    #[test]
    fn tables_from_entries() {
        let method = static_method(
            "(Ljava/lang/String;)V",
            vec![
                Entry::TryCatch {
                    start: Label(0),
                    end: Label(1),
                    handler: Label(2),
                    catch_type: Some("java/lang/Exception".into()),
                },
                Entry::Label(Label(0)),
                Entry::Line(3),
                insn(Instruction::Simple(RETURN)),
                Entry::Label(Label(1)),
                Entry::Line(4),
                Entry::Frame(Frame::SameLocals1StackItem(VerificationType::Object(
                    "java/lang/Exception".into(),
                ))),
                Entry::Label(Label(2)),
                insn(Instruction::Simple(ATHROW)),
                Entry::Label(Label(3)),
                Entry::LocalVariable(LocalVariable {
                    index: 0,
                    name: "args".into(),
                    descriptor: "Ljava/lang/String;".into(),
                    signature: None,
                    start: Label(0),
                    end: Label(3),
                }),
            ],
        );
        let (code, constants) = write(&method).unwrap();
        assert_eq!(code.exception_table.len(), 1);
        assert_eq!(code.exception_table[0].handler_pc, 1);
        assert_eq!(code.max_stack, 1);
        assert_eq!(code.max_locals, 1);

        let pool = constants.pool.into_offset_vec();
        let names: Vec<&str> = code
            .attributes
            .iter()
            .map(|attr: &Attribute| pool.utf8(attr.name_index).unwrap())
            .collect();
        assert_eq!(names, vec!["LineNumberTable", "LocalVariableTable", "StackMapTable"]);
        let lines = code.attributes[0].parse::<LineNumberTable>().unwrap();
        assert_eq!(lines.0.len(), 2);
        assert_eq!(lines.0[1].start_pc, 1);
    }

    #[test]
    fn frames_must_increase() {
        let method = static_method(
            "()V",
            vec![
                Entry::Frame(Frame::Same),
                Entry::Frame(Frame::Same),
                insn(Instruction::Simple(RETURN)),
            ],
        );
        assert!(matches!(write(&method), Err(Error::Verification { .. })));
    }

    #[test]
    fn rejects_short_form_opcodes() {
        let method = static_method("()V", vec![insn(Instruction::Simple(ILOAD_0))]);
        assert!(matches!(write(&method), Err(Error::Verification { .. })));
    }
}
