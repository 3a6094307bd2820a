//! Loaded modules.
//!
//! Loading concatenates the compiled string pool into one contiguous buffer
//! with `{offset, length, hash}` descriptors aliasing into it, copies the
//! instruction array with `call_ext` operands rewritten from dependency
//! indices to VM external indices, and validates every index operand.
//! Once loaded, a module is immutable.

use crate::bytecode::{
    CompiledModule, Instruction, Op, ScriptFunction, SwitchTable, MAIN_FUNCTION_NAME,
};
use crate::error::{VmError, VmResult};
use crate::heap::hash_name;

/// A pool string viewed through its descriptor.
#[derive(Debug, Clone, Copy)]
pub struct InternedString<'a> {
    pub bytes: &'a [u8],
    pub hash: u32,
}

#[derive(Debug, Clone, Copy)]
struct StringDesc {
    offset: u32,
    length: u32,
    hash: u32,
}

/// A module loaded into a VM.
#[derive(Debug)]
pub struct Module {
    functions: Vec<ScriptFunction>,
    instructions: Vec<Instruction>,
    string_data: Box<[u8]>,
    strings: Vec<StringDesc>,
    switch_tables: Vec<SwitchTable>,
}

impl Module {
    /// Builds a loaded module. `external_indices` maps each dependency of
    /// the compiled module to an external index within the VM.
    pub(crate) fn link(compiled: &CompiledModule, external_indices: &[usize]) -> VmResult<Module> {
        let mut string_data = Vec::new();
        let mut strings = Vec::with_capacity(compiled.string_pool.len());

        for bytes in &compiled.string_pool {
            let offset = string_data.len() as u32;
            string_data.extend_from_slice(bytes);

            strings.push(StringDesc {
                offset,
                length: bytes.len() as u32,
                hash: hash_name(bytes),
            });
        }

        let mut instructions = Vec::with_capacity(compiled.code.len());

        for (pc, instruction) in compiled.code.iter().enumerate() {
            let mut instruction = instruction.clone();

            let (kind, index, limit) = match instruction.op {
                Op::CallExt(dependency) => {
                    let dependency = dependency as usize;

                    if dependency >= external_indices.len() {
                        return Err(VmError::IndexOutOfRange {
                            kind: "dependency",
                            index: dependency,
                            pc,
                            limit: external_indices.len(),
                        });
                    }

                    instruction.op = Op::CallExt(external_indices[dependency] as u32);
                    instructions.push(instruction);
                    continue;
                }
                Op::Invoke(index)
                | Op::PushString(index)
                | Op::GetProperty(index)
                | Op::SetMember(index)
                | Op::Assert(index) => ("string", index as usize, strings.len()),
                Op::Switch(index) => ("switch table", index as usize, compiled.switch_tables.len()),
                Op::CallFunc(index) | Op::PushFunc(index) => {
                    ("function", index as usize, compiled.functions.len())
                }
                Op::Jmp(address) | Op::JmpTrue(address) | Op::JmpFalse(address) => {
                    ("code address", address as usize, compiled.code.len())
                }
                _ => {
                    instructions.push(instruction);
                    continue;
                }
            };

            if index >= limit {
                return Err(VmError::IndexOutOfRange {
                    kind,
                    index,
                    pc,
                    limit,
                });
            }

            instructions.push(instruction);
        }

        Ok(Module {
            functions: compiled.functions.clone(),
            instructions,
            string_data: string_data.into_boxed_slice(),
            strings,
            switch_tables: compiled.switch_tables.clone(),
        })
    }

    pub fn functions(&self) -> &[ScriptFunction] {
        &self.functions
    }

    pub fn function(&self, index: u32) -> &ScriptFunction {
        &self.functions[index as usize]
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn switch_table(&self, index: u32) -> &SwitchTable {
        &self.switch_tables[index as usize]
    }

    /// The interned string at `index`, with its precomputed hash.
    pub fn string(&self, index: u32) -> InternedString<'_> {
        let desc = self.strings[index as usize];
        InternedString {
            bytes: &self.string_data[desc.offset as usize..(desc.offset + desc.length) as usize],
            hash: desc.hash,
        }
    }

    /// Index of the function named `.main`, if any.
    pub fn find_main_function(&self) -> Option<u32> {
        self.functions
            .iter()
            .position(|function| function.name == MAIN_FUNCTION_NAME)
            .map(|index| index as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{ArgumentList, Instruction, Op};

    fn module_with_code(code: Vec<Instruction>) -> CompiledModule {
        CompiledModule {
            dependencies: Vec::new(),
            functions: vec![ScriptFunction {
                name: MAIN_FUNCTION_NAME.into(),
                arguments: ArgumentList::Explicit { count: 0 },
                start: 0,
                length: code.len() as u32,
                exception_handlers: Vec::new(),
            }],
            code,
            string_pool: vec![b"alpha".to_vec(), b"beta".to_vec()],
            switch_tables: Vec::new(),
        }
    }

    #[test]
    fn test_interned_strings_carry_hashes() {
        let compiled = module_with_code(vec![
            Instruction::new(Op::PushString(1)),
            Instruction::new(Op::Ret),
        ]);
        let module = Module::link(&compiled, &[]).unwrap();

        let interned = module.string(0);
        assert_eq!(interned.bytes, b"alpha");
        assert_eq!(interned.hash, hash_name(b"alpha"));
        assert_eq!(module.string(1).bytes, b"beta");
    }

    #[test]
    fn test_call_ext_operands_are_rewritten() {
        let mut compiled = module_with_code(vec![
            Instruction::new(Op::CallExt(0)),
            Instruction::new(Op::Ret),
        ]);
        compiled.dependencies.push("print".into());

        let module = Module::link(&compiled, &[7]).unwrap();
        assert_eq!(module.instructions()[0].op, Op::CallExt(7));
    }

    #[test]
    fn test_out_of_range_string_index_is_rejected() {
        let compiled = module_with_code(vec![Instruction::new(Op::PushString(9))]);

        let error = Module::link(&compiled, &[]).unwrap_err();
        assert!(matches!(error, VmError::IndexOutOfRange { kind: "string", .. }));
    }
}
