//! Class-file decoding.
//!
//! Parses raw class-file bytes with `jclassfile` and lowers the constant pool
//! and bytecode into [`ClassFacts`]. Branch targets and exception ranges are
//! rewritten from byte offsets to instruction indices.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use jclassfile::attributes::{Attribute, ExceptionRecord};
use jclassfile::class_file;
use jclassfile::constant_pool::ConstantPool;

use super::facts::{AccessFlags, ClassFacts, ExceptionHandler, FieldFacts, MethodFacts};
use super::instructions::{Constant, FieldRef, Instruction, InvokeKind, Kind, MethodRef, StackOp};
use super::names::ClassName;

/// Decode a complete class file.
pub fn read_class_bytes(data: &[u8]) -> Result<ClassFacts> {
    let class_file = class_file::parse(data).context("failed to parse class file bytes")?;
    let pool = class_file.constant_pool();

    let name = resolve_class_name(pool, class_file.this_class()).context("resolve class name")?;
    let super_name = if class_file.super_class() == 0 {
        None
    } else {
        Some(resolve_class_name(pool, class_file.super_class()).context("resolve super class name")?)
    };
    let mut interfaces = Vec::new();
    for interface in class_file.interfaces() {
        interfaces.push(resolve_class_name(pool, *interface).context("resolve interface name")?);
    }

    let bootstraps = bootstrap_owners(pool, class_file.attributes()).context("resolve bootstrap methods")?;

    let mut fields = Vec::new();
    for field in class_file.fields() {
        fields.push(FieldFacts {
            name: resolve_utf8(pool, field.name_index()).context("resolve field name")?,
            descriptor: resolve_utf8(pool, field.descriptor_index())
                .context("resolve field descriptor")?,
            access: AccessFlags(field.access_flags().bits()),
        });
    }

    let mut methods = Vec::new();
    for method in class_file.methods() {
        let method_name = resolve_utf8(pool, method.name_index()).context("resolve method name")?;
        let descriptor =
            resolve_utf8(pool, method.descriptor_index()).context("resolve method descriptor")?;
        let access = AccessFlags(method.access_flags().bits());

        let code = method.attributes().iter().find_map(|attribute| match attribute {
            Attribute::Code {
                max_locals,
                code,
                exception_table,
                ..
            } => Some((*max_locals, code, exception_table)),
            _ => None,
        });

        let (max_locals, instructions, handlers) = match code {
            Some((max_locals, code, exception_table)) => {
                let (instructions, handlers) = decode_body(code, exception_table, pool, &bootstraps)
                    .with_context(|| format!("decode {}.{}{}", name, method_name, descriptor))?;
                (max_locals, instructions, handlers)
            }
            None => (0, Vec::new(), Vec::new()),
        };

        methods.push(MethodFacts {
            name: method_name,
            descriptor,
            access,
            max_locals,
            instructions,
            handlers,
        });
    }

    Ok(ClassFacts {
        name,
        super_name,
        interfaces,
        access: AccessFlags(class_file.access_flags().bits()),
        fields,
        methods,
    })
}

fn decode_body(
    code: &[u8],
    exception_table: &[ExceptionRecord],
    pool: &[ConstantPool],
    bootstraps: &[ClassName],
) -> Result<(Vec<Instruction>, Vec<ExceptionHandler>)> {
    let mut instructions = Vec::new();
    let mut index_of_offset = HashMap::new();
    let mut offset = 0usize;
    while offset < code.len() {
        index_of_offset.insert(offset, instructions.len());
        let (instruction, length) =
            decode_instruction(code, offset, pool, bootstraps).with_context(|| format!("at offset {}", offset))?;
        instructions.push(instruction);
        offset += length;
    }
    let end_index = instructions.len();

    let lookup = |target: usize| -> Result<usize> {
        if target == code.len() {
            return Ok(end_index);
        }
        index_of_offset
            .get(&target)
            .copied()
            .with_context(|| format!("offset {} is not an instruction boundary", target))
    };

    for instruction in instructions.iter_mut() {
        instruction.remap_targets(&lookup)?;
    }

    let mut handlers = Vec::new();
    for record in exception_table {
        let catch_type = if record.catch_type() == 0 {
            None
        } else {
            Some(resolve_class_name(pool, record.catch_type()).context("resolve catch type")?)
        };
        handlers.push(ExceptionHandler {
            start: lookup(record.start_pc() as usize)?,
            end: lookup(record.end_pc() as usize)?,
            handler: lookup(record.handler_pc() as usize)?,
            catch_type,
        });
    }

    Ok((instructions, handlers))
}

/// Kind for the typed opcode families laid out as i, l, f, d, a.
fn family_kind(position: u8) -> Kind {
    match position {
        0 => Kind::Int,
        1 => Kind::Long,
        2 => Kind::Float,
        3 => Kind::Double,
        _ => Kind::Reference,
    }
}

/// Kind for the xaload/xastore families: i, l, f, d, a, b, c, s.
fn array_kind(position: u8) -> Kind {
    match position {
        1 => Kind::Long,
        2 => Kind::Float,
        3 => Kind::Double,
        4 => Kind::Reference,
        _ => Kind::Int,
    }
}

fn decode_instruction(
    code: &[u8],
    offset: usize,
    pool: &[ConstantPool],
    bootstraps: &[ClassName],
) -> Result<(Instruction, usize)> {
    let opcode = code[offset];
    let branch = |pops: u8| -> Result<(Instruction, usize)> {
        let target = relative(offset, read_i16(code, offset + 1)? as i64)?;
        Ok((Instruction::Branch { pops, target }, 3))
    };

    let decoded = match opcode {
        0x00 => (Instruction::Nop, 1),
        0x01 => (Instruction::Constant(Constant::Null), 1),
        0x02..=0x08 => (Instruction::Constant(Constant::Int), 1),
        0x09..=0x0a => (Instruction::Constant(Constant::Long), 1),
        0x0b..=0x0d => (Instruction::Constant(Constant::Float), 1),
        0x0e..=0x0f => (Instruction::Constant(Constant::Double), 1),
        0x10 => (Instruction::Constant(Constant::Int), 2),
        0x11 => (Instruction::Constant(Constant::Int), 3),
        0x12 => {
            let index = *code.get(offset + 1).context("ldc index")? as u16;
            (Instruction::Constant(resolve_constant(pool, index)?), 2)
        }
        0x13 | 0x14 => {
            let index = read_u16(code, offset + 1)?;
            (Instruction::Constant(resolve_constant(pool, index)?), 3)
        }
        0x15..=0x19 => {
            let slot = *code.get(offset + 1).context("load slot")? as u16;
            (Instruction::Load { kind: family_kind(opcode - 0x15), slot }, 2)
        }
        0x1a..=0x2d => {
            let n = opcode - 0x1a;
            (Instruction::Load { kind: family_kind(n / 4), slot: (n % 4) as u16 }, 1)
        }
        0x2e..=0x35 => (Instruction::ArrayLoad(array_kind(opcode - 0x2e)), 1),
        0x36..=0x3a => {
            let slot = *code.get(offset + 1).context("store slot")? as u16;
            (Instruction::Store { kind: family_kind(opcode - 0x36), slot }, 2)
        }
        0x3b..=0x4e => {
            let n = opcode - 0x3b;
            (Instruction::Store { kind: family_kind(n / 4), slot: (n % 4) as u16 }, 1)
        }
        0x4f..=0x56 => (Instruction::ArrayStore(array_kind(opcode - 0x4f)), 1),
        0x57 => (Instruction::Stack(StackOp::Pop), 1),
        0x58 => (Instruction::Stack(StackOp::Pop2), 1),
        0x59 => (Instruction::Stack(StackOp::Dup), 1),
        0x5a => (Instruction::Stack(StackOp::DupX1), 1),
        0x5b => (Instruction::Stack(StackOp::DupX2), 1),
        0x5c => (Instruction::Stack(StackOp::Dup2), 1),
        0x5d => (Instruction::Stack(StackOp::Dup2X1), 1),
        0x5e => (Instruction::Stack(StackOp::Dup2X2), 1),
        0x5f => (Instruction::Stack(StackOp::Swap), 1),
        // add, sub, mul, div, rem
        0x60..=0x73 => (
            Instruction::Compute { pops: 2, push: Some(family_kind((opcode - 0x60) % 4)) },
            1,
        ),
        // neg
        0x74..=0x77 => (
            Instruction::Compute { pops: 1, push: Some(family_kind(opcode - 0x74)) },
            1,
        ),
        // shifts and bitwise ops alternate int/long
        0x78..=0x83 => {
            let kind = if (opcode - 0x78) % 2 == 0 { Kind::Int } else { Kind::Long };
            (Instruction::Compute { pops: 2, push: Some(kind) }, 1)
        }
        0x84 => {
            let slot = *code.get(offset + 1).context("iinc slot")? as u16;
            (Instruction::Increment { slot }, 3)
        }
        0x85..=0x93 => {
            let kind = match opcode {
                0x85 | 0x8c | 0x8f => Kind::Long,
                0x86 | 0x89 | 0x90 => Kind::Float,
                0x87 | 0x8a | 0x8d => Kind::Double,
                _ => Kind::Int,
            };
            (Instruction::Compute { pops: 1, push: Some(kind) }, 1)
        }
        0x94..=0x98 => (Instruction::Compute { pops: 2, push: Some(Kind::Int) }, 1),
        0x99..=0x9e | 0xc6 | 0xc7 => branch(1)?,
        0x9f..=0xa6 => branch(2)?,
        0xa7 => {
            let target = relative(offset, read_i16(code, offset + 1)? as i64)?;
            (Instruction::Goto { target }, 3)
        }
        0xc8 => {
            let target = relative(offset, read_i32(code, offset + 1)? as i64)?;
            (Instruction::Goto { target }, 5)
        }
        0xa8 | 0xa9 | 0xc9 => bail!("subroutines (jsr/ret) are not supported"),
        0xaa => decode_tableswitch(code, offset)?,
        0xab => decode_lookupswitch(code, offset)?,
        0xac..=0xb0 => (Instruction::Return(Some(family_kind(opcode - 0xac))), 1),
        0xb1 => (Instruction::Return(None), 1),
        0xb2..=0xb5 => {
            let field = resolve_field_ref(pool, read_u16(code, offset + 1)?)?;
            let instruction = match opcode {
                0xb2 => Instruction::GetStatic(field),
                0xb3 => Instruction::PutStatic(field),
                0xb4 => Instruction::GetField(field),
                _ => Instruction::PutField(field),
            };
            (instruction, 3)
        }
        0xb6..=0xb9 => {
            let method = resolve_method_ref(pool, read_u16(code, offset + 1)?)?;
            let kind = match opcode {
                0xb6 => InvokeKind::Virtual,
                0xb7 => InvokeKind::Special,
                0xb8 => InvokeKind::Static,
                _ => InvokeKind::Interface,
            };
            let length = if opcode == 0xb9 { 5 } else { 3 };
            (Instruction::Invoke { kind, method }, length)
        }
        0xba => {
            let (bootstrap_index, name, descriptor) = resolve_invoke_dynamic(pool, read_u16(code, offset + 1)?)?;
            let bootstrap = bootstraps.get(bootstrap_index as usize).cloned();
            (Instruction::InvokeDynamic { name, descriptor, bootstrap }, 5)
        }
        0xbb => {
            let class = resolve_class_name(pool, read_u16(code, offset + 1)?)?;
            (Instruction::New(class), 3)
        }
        0xbc => {
            let atype = *code.get(offset + 1).context("newarray type")?;
            let element = match atype {
                4 => 'Z',
                5 => 'C',
                6 => 'F',
                7 => 'D',
                8 => 'B',
                9 => 'S',
                10 => 'I',
                11 => 'J',
                other => bail!("invalid newarray type {}", other),
            };
            (
                Instruction::NewArray { descriptor: format!("[{}", element), dimensions: 1 },
                2,
            )
        }
        0xbd => {
            let element = resolve_class_constant(pool, read_u16(code, offset + 1)?)?;
            (
                Instruction::NewArray { descriptor: format!("[{}", as_descriptor(&element)), dimensions: 1 },
                3,
            )
        }
        0xbe => (Instruction::ArrayLength, 1),
        0xbf => (Instruction::Throw, 1),
        0xc0 => {
            let target = resolve_class_constant(pool, read_u16(code, offset + 1)?)?;
            (Instruction::CheckCast(as_descriptor(&target)), 3)
        }
        0xc1 => (Instruction::InstanceOf, 3),
        0xc2 | 0xc3 => (Instruction::Monitor, 1),
        0xc4 => decode_wide(code, offset)?,
        0xc5 => {
            let descriptor = resolve_class_constant(pool, read_u16(code, offset + 1)?)?;
            let dimensions = *code.get(offset + 3).context("multianewarray dimensions")?;
            (Instruction::NewArray { descriptor, dimensions }, 4)
        }
        other => bail!("unsupported opcode 0x{:02x}", other),
    };

    if offset + decoded.1 > code.len() {
        bail!("truncated instruction 0x{:02x}", opcode);
    }
    Ok(decoded)
}

fn decode_wide(code: &[u8], offset: usize) -> Result<(Instruction, usize)> {
    let opcode = *code.get(offset + 1).context("missing wide opcode")?;
    let slot = read_u16(code, offset + 2)?;
    let instruction = match opcode {
        0x15..=0x19 => Instruction::Load { kind: family_kind(opcode - 0x15), slot },
        0x36..=0x3a => Instruction::Store { kind: family_kind(opcode - 0x36), slot },
        0x84 => return Ok((Instruction::Increment { slot }, 6)),
        0xa9 => bail!("subroutines (jsr/ret) are not supported"),
        other => bail!("invalid wide opcode 0x{:02x}", other),
    };
    Ok((instruction, 4))
}

fn padding(offset: usize) -> usize {
    (4 - ((offset + 1) % 4)) % 4
}

fn decode_tableswitch(code: &[u8], offset: usize) -> Result<(Instruction, usize)> {
    let base = offset + 1 + padding(offset);
    let default = relative(offset, read_i32(code, base)? as i64)?;
    let low = read_i32(code, base + 4)?;
    let high = read_i32(code, base + 8)?;
    let count = (high as i64) - (low as i64) + 1;
    if count < 0 {
        bail!("invalid tableswitch range");
    }
    let mut targets = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        targets.push(relative(offset, read_i32(code, base + 12 + i * 4)? as i64)?);
    }
    let length = 1 + padding(offset) + 12 + targets.len() * 4;
    Ok((Instruction::Switch { targets, default }, length))
}

fn decode_lookupswitch(code: &[u8], offset: usize) -> Result<(Instruction, usize)> {
    let base = offset + 1 + padding(offset);
    let default = relative(offset, read_i32(code, base)? as i64)?;
    let pairs = read_i32(code, base + 4)?;
    if pairs < 0 {
        bail!("invalid lookupswitch pairs");
    }
    let mut targets = Vec::with_capacity(pairs as usize);
    for i in 0..pairs as usize {
        targets.push(relative(offset, read_i32(code, base + 8 + i * 8 + 4)? as i64)?);
    }
    let length = 1 + padding(offset) + 8 + targets.len() * 8;
    Ok((Instruction::Switch { targets, default }, length))
}

fn relative(offset: usize, delta: i64) -> Result<usize> {
    let target = offset as i64 + delta;
    if target < 0 {
        bail!("branch target {} before method start", target);
    }
    Ok(target as usize)
}

fn read_u16(code: &[u8], offset: usize) -> Result<u16> {
    let slice = code
        .get(offset..offset + 2)
        .context("bytecode u16 out of bounds")?;
    Ok(u16::from_be_bytes([slice[0], slice[1]]))
}

fn read_i16(code: &[u8], offset: usize) -> Result<i16> {
    Ok(read_u16(code, offset)? as i16)
}

fn read_i32(code: &[u8], offset: usize) -> Result<i32> {
    let slice = code
        .get(offset..offset + 4)
        .context("bytecode i32 out of bounds")?;
    Ok(i32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

/// Turn a class-constant name into a field descriptor.
fn as_descriptor(name: &str) -> String {
    if name.starts_with('[') {
        name.to_string()
    } else {
        format!("L{};", name.replace('.', "/"))
    }
}

fn entry(pool: &[ConstantPool], index: u16) -> Result<&ConstantPool> {
    pool.get(index as usize)
        .with_context(|| format!("missing constant pool entry {}", index))
}

fn resolve_utf8(pool: &[ConstantPool], index: u16) -> Result<String> {
    match entry(pool, index)? {
        ConstantPool::Utf8 { value } => Ok(value.clone()),
        _ => bail!("constant pool entry {} is not utf8", index),
    }
}

/// Raw class-constant text, which is an array descriptor for array classes.
fn resolve_class_constant(pool: &[ConstantPool], index: u16) -> Result<String> {
    match entry(pool, index)? {
        ConstantPool::Class { name_index } => resolve_utf8(pool, *name_index),
        _ => bail!("constant pool entry {} is not a class", index),
    }
}

fn resolve_class_name(pool: &[ConstantPool], index: u16) -> Result<ClassName> {
    Ok(ClassName::new(resolve_class_constant(pool, index)?))
}

fn resolve_name_and_type(pool: &[ConstantPool], index: u16) -> Result<(String, String)> {
    match entry(pool, index)? {
        ConstantPool::NameAndType {
            name_index,
            descriptor_index,
        } => Ok((resolve_utf8(pool, *name_index)?, resolve_utf8(pool, *descriptor_index)?)),
        _ => bail!("constant pool entry {} is not a name-and-type", index),
    }
}

fn resolve_field_ref(pool: &[ConstantPool], index: u16) -> Result<FieldRef> {
    match entry(pool, index)? {
        ConstantPool::Fieldref {
            class_index,
            name_and_type_index,
        } => {
            let owner = resolve_class_name(pool, *class_index).context("resolve field owner")?;
            let (name, descriptor) = resolve_name_and_type(pool, *name_and_type_index)?;
            Ok(FieldRef { owner, name, descriptor })
        }
        _ => bail!("constant pool entry {} is not a field reference", index),
    }
}

fn resolve_method_ref(pool: &[ConstantPool], index: u16) -> Result<MethodRef> {
    let (class_index, name_and_type_index) = match entry(pool, index)? {
        ConstantPool::Methodref {
            class_index,
            name_and_type_index,
        }
        | ConstantPool::InterfaceMethodref {
            class_index,
            name_and_type_index,
        } => (*class_index, *name_and_type_index),
        _ => bail!("constant pool entry {} is not a method reference", index),
    };
    let owner = resolve_class_name(pool, class_index).context("resolve method owner")?;
    let (name, descriptor) = resolve_name_and_type(pool, name_and_type_index)?;
    Ok(MethodRef { owner, name, descriptor })
}

/// Bootstrap attribute index, name and descriptor of a call site.
fn resolve_invoke_dynamic(pool: &[ConstantPool], index: u16) -> Result<(u16, String, String)> {
    match entry(pool, index)? {
        ConstantPool::InvokeDynamic {
            bootstrap_method_attr_index,
            name_and_type_index,
        } => {
            let (name, descriptor) = resolve_name_and_type(pool, *name_and_type_index)?;
            Ok((*bootstrap_method_attr_index, name, descriptor))
        }
        _ => bail!("constant pool entry {} is not an invokedynamic", index),
    }
}

/// Declaring class of each entry in the `BootstrapMethods` attribute, in order.
fn bootstrap_owners(pool: &[ConstantPool], attributes: &[Attribute]) -> Result<Vec<ClassName>> {
    let Some(methods) = attributes.iter().find_map(|attribute| match attribute {
        Attribute::BootstrapMethods { bootstrap_methods } => Some(bootstrap_methods),
        _ => None,
    }) else {
        return Ok(Vec::new());
    };
    methods
        .iter()
        .map(|method| method_handle_owner(pool, method.bootstrap_method_ref()))
        .collect()
}

fn method_handle_owner(pool: &[ConstantPool], index: u16) -> Result<ClassName> {
    match entry(pool, index)? {
        ConstantPool::MethodHandle { reference_index, .. } => Ok(resolve_method_ref(pool, *reference_index)?.owner),
        _ => bail!("constant pool entry {} is not a method handle", index),
    }
}

fn resolve_constant(pool: &[ConstantPool], index: u16) -> Result<Constant> {
    Ok(match entry(pool, index)? {
        ConstantPool::Integer { .. } => Constant::Int,
        ConstantPool::Float { .. } => Constant::Float,
        ConstantPool::Long { .. } => Constant::Long,
        ConstantPool::Double { .. } => Constant::Double,
        ConstantPool::String { .. } => Constant::String,
        ConstantPool::Class { .. } => Constant::Class,
        _ => Constant::Other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> Vec<ConstantPool> {
        Vec::new()
    }

    fn decode(code: &[u8]) -> Vec<Instruction> {
        decode_body(code, &[], &pool(), &[]).unwrap().0
    }

    #[test]
    fn test_decode_loads_stores_and_return() {
        // aload_0, iload_1, lstore 4, areturn
        let instructions = decode(&[0x2a, 0x1b, 0x37, 0x04, 0xb0]);
        assert_eq!(
            instructions,
            vec![
                Instruction::aload(0),
                Instruction::iload(1),
                Instruction::Store { kind: Kind::Long, slot: 4 },
                Instruction::areturn(),
            ]
        );
    }

    #[test]
    fn test_branch_targets_become_indices() {
        // 0: aload_1, 1: ifnull +5 (-> 6), 4: aconst_null, 5: areturn, 6: aload_1, 7: areturn
        let instructions = decode(&[0x2b, 0xc6, 0x00, 0x05, 0x01, 0xb0, 0x2b, 0xb0]);
        assert_eq!(instructions[1], Instruction::Branch { pops: 1, target: 4 });
    }

    #[test]
    fn test_tableswitch_decoding() {
        // 0: iload_1, 1: tableswitch (pad 2), default +23, low 0, high 1, +23, +24
        let mut code = vec![0x2b, 0xaa, 0x00, 0x00];
        for value in [23i32, 0, 1, 23, 24] {
            code.extend_from_slice(&value.to_be_bytes());
        }
        // 24: return, 25: return
        code.push(0xb1);
        code.push(0xb1);
        let instructions = decode(&code);
        assert_eq!(
            instructions[1],
            Instruction::Switch { targets: vec![2, 3], default: 2 }
        );
    }

    #[test]
    fn test_branch_into_operand_is_rejected() {
        // goto +1 lands inside its own operand
        assert!(decode_body(&[0xa7, 0x00, 0x01], &[], &pool(), &[]).is_err());
    }

    #[test]
    fn test_jsr_is_rejected() {
        assert!(decode_body(&[0xa8, 0x00, 0x03, 0xb1], &[], &pool(), &[]).is_err());
    }

    #[test]
    fn test_wide_iinc() {
        let instructions = decode(&[0xc4, 0x84, 0x01, 0x00, 0x00, 0x05, 0xb1]);
        assert_eq!(instructions[0], Instruction::Increment { slot: 256 });
    }
}
