//! Bytecode compiler.
//!
//! Emits a flat instruction array shared by all functions of the module.
//! By-name calls and pushes cannot be resolved while the function list is
//! still growing (anonymous functions are discovered mid-compilation), so
//! they are emitted as provisional entries and a fixup pass (`cook`)
//! rewrites them to direct calls, external calls, function-reference pushes
//! or local reads once every function is known.
//!
//! Classes are desugared here: the VM only ever sees objects and functions.
//! A class compiles to a constructor function named after the class whose
//! body first assigns `this` an object holding the method references and
//! initialized members, plus one `Class|method` function per method. Every
//! function ends with an implicit `return this`.

use std::sync::Arc;

use hashbrown::HashMap;

use quill_vm::bytecode::{
    ArgumentList, CompiledModule, HandlerRange, Instruction, InstructionOrigin, Op, ScriptFunction,
    SwitchTable, SwitchValue, LOCALS_MAX, LOCAL_THIS,
};

use crate::ast::{Block, Expr, FunctionDecl, Literal, Script, Span, Stmt, UnaryOp};
use crate::error::{CompileError, CompileResult};

/// Code-generation options.
#[derive(Debug, Clone)]
pub struct CodegenOptions {
    /// Unit name recorded in instruction origins.
    pub unit_name: String,
    /// Attach origin metadata (unit, function, line) to instructions.
    pub debug_info: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            unit_name: "<script>".to_owned(),
            debug_info: true,
        }
    }
}

/// Compiles a parsed script into a module.
pub fn compile(script: &Script, options: &CodegenOptions) -> CompileResult<CompiledModule> {
    let (sources, classes) = desugar(script);

    let mut assembler = Assembler {
        options,
        classes: &classes,
        functions: sources
            .iter()
            .map(|source| PendingFunction::new(source))
            .collect(),
        current: 0,
        code: Vec::new(),
        string_pool: Vec::new(),
        string_indices: HashMap::new(),
        temporary_strings: Vec::new(),
        dependencies: Vec::new(),
        switch_tables: Vec::new(),
        script_functions: Vec::new(),
        current_handlers: Vec::new(),
        unit: Arc::from(options.unit_name.as_str()),
        current_function_name: Arc::from(""),
    };

    let mut index = 0;
    while index < assembler.functions.len() {
        assembler.compile_function(index)?;
        index += 1;
    }

    assembler.cook()?;
    assembler.finish()
}

/* CLASS DESUGARING */

struct ClassInfo {
    name: String,
    members: Vec<String>,
    /// All method names as written, the constructor included.
    methods: Vec<String>,
}

struct FunctionSource {
    decl: FunctionDecl,
    class: Option<usize>,
}

fn desugar(script: &Script) -> (Vec<FunctionSource>, Vec<ClassInfo>) {
    let mut sources = vec![FunctionSource {
        decl: script.main.clone(),
        class: None,
    }];
    let mut classes = Vec::new();

    for class in &script.classes {
        let class_index = classes.len();
        classes.push(ClassInfo {
            name: class.name.clone(),
            members: class.members.iter().map(|member| member.name.clone()).collect(),
            methods: class.methods.iter().map(|method| method.name.clone()).collect(),
        });

        let constructor = class
            .methods
            .iter()
            .find(|method| method.name == "constructor");
        let other_methods: Vec<&FunctionDecl> = class
            .methods
            .iter()
            .filter(|method| method.name != "constructor")
            .collect();

        // `this = { method: Class|method, ..., member: initializer, ... }`
        let mut properties: Vec<(String, Expr)> = other_methods
            .iter()
            .map(|method| {
                (
                    method.name.clone(),
                    Expr::Identifier {
                        name: format!("{}|{}", class.name, method.name),
                        forced_local: false,
                        span: method.span,
                    },
                )
            })
            .collect();

        for member in &class.members {
            if let Some(initializer) = &member.initializer {
                properties.push((member.name.clone(), initializer.clone()));
            }
        }

        let construction = Stmt::Assignment {
            target: Expr::Identifier {
                name: "this".to_owned(),
                forced_local: true,
                span: class.span,
            },
            value: Expr::Literal(Literal::Object {
                properties,
                span: class.span,
            }),
            span: class.span,
        };

        let mut body = Block {
            statements: vec![construction],
            span: class.span,
        };
        let mut parameters = Vec::new();
        let mut span = class.span;

        if let Some(constructor) = constructor {
            body.statements
                .push(Stmt::Block(constructor.body.clone()));
            parameters = constructor.parameters.clone();
            span = constructor.span;
        }

        sources.push(FunctionSource {
            decl: FunctionDecl {
                name: class.name.clone(),
                parameters,
                body,
                span,
            },
            class: Some(class_index),
        });

        for method in other_methods {
            let mut decl = method.clone();
            decl.name = format!("{}|{}", class.name, method.name);

            sources.push(FunctionSource {
                decl,
                class: Some(class_index),
            });
        }
    }

    for function in &script.functions {
        sources.push(FunctionSource {
            decl: function.clone(),
            class: None,
        });
    }

    (sources, classes)
}

/* ASSEMBLY */

#[derive(Debug, Clone, Copy)]
enum PendingOp {
    Op(Op),
    /// A by-name call; resolved to `call_func` or `call_ext`.
    UnknownCall { name_index: usize },
    /// A by-name push; resolved to `pushc_func` or `getLocal` in the
    /// emitting function.
    UnknownPush { name_index: usize, function: usize },
}

struct PendingInstr {
    op: PendingOp,
    origin: Option<Arc<InstructionOrigin>>,
}

struct PendingFunction<'a> {
    name: &'a str,
    decl: &'a FunctionDecl,
    class: Option<usize>,
    /// Local slot names. Slot 0 is always `this`.
    locals: Vec<String>,
    arguments: Vec<String>,
}

impl<'a> PendingFunction<'a> {
    fn new(source: &'a FunctionSource) -> Self {
        Self {
            name: &source.decl.name,
            decl: &source.decl,
            class: source.class,
            locals: vec!["this".to_owned()],
            arguments: Vec::new(),
        }
    }

    fn from_decl(decl: &'a FunctionDecl) -> Self {
        Self {
            name: &decl.name,
            decl,
            class: None,
            locals: vec!["this".to_owned()],
            arguments: Vec::new(),
        }
    }

    fn create_local(&mut self, name: &str, span: Span) -> CompileResult<u16> {
        if self.locals.len() >= LOCALS_MAX {
            return Err(CompileError::codegen("too many local variables", span));
        }

        self.locals.push(name.to_owned());
        Ok((self.locals.len() - 1) as u16)
    }

    fn try_get_local(&self, name: &str) -> Option<u16> {
        self.locals
            .iter()
            .position(|local| local == name)
            .map(|index| index as u16)
    }

    fn get_or_alloc_local(&mut self, name: &str, span: Span) -> CompileResult<u16> {
        match self.try_get_local(name) {
            Some(index) => Ok(index),
            None => self.create_local(name, span),
        }
    }

    fn is_argument(&self, name: &str) -> bool {
        self.arguments.iter().any(|argument| argument == name)
    }
}

struct Assembler<'a> {
    options: &'a CodegenOptions,
    classes: &'a [ClassInfo],
    /// Worklist; grows while function expressions are discovered.
    functions: Vec<PendingFunction<'a>>,
    current: usize,
    code: Vec<PendingInstr>,
    string_pool: Vec<Vec<u8>>,
    string_indices: HashMap<Vec<u8>, u32>,
    temporary_strings: Vec<String>,
    dependencies: Vec<String>,
    switch_tables: Vec<SwitchTable>,
    script_functions: Vec<ScriptFunction>,
    /// Handler ranges of the function being compiled, innermost first.
    current_handlers: Vec<HandlerRange>,
    unit: Arc<str>,
    current_function_name: Arc<str>,
}

impl<'a> Assembler<'a> {
    fn current_offset(&self) -> u32 {
        self.code.len() as u32
    }

    fn origin(&self, span: Span) -> Option<Arc<InstructionOrigin>> {
        self.options.debug_info.then(|| {
            Arc::new(InstructionOrigin {
                unit: Arc::clone(&self.unit),
                function: Arc::clone(&self.current_function_name),
                line: span.start.line,
            })
        })
    }

    fn emit(&mut self, op: Op, span: Span) -> usize {
        self.code.push(PendingInstr {
            op: PendingOp::Op(op),
            origin: self.origin(span),
        });
        self.code.len() - 1
    }

    fn emit_pending(&mut self, op: PendingOp, span: Span) {
        self.code.push(PendingInstr {
            op,
            origin: self.origin(span),
        });
    }

    fn patch_jump(&mut self, index: usize, target: u32) {
        if let PendingOp::Op(op) = &mut self.code[index].op {
            if let Some(address) = op.code_address_mut() {
                *address = target;
                return;
            }
        }

        unreachable!("patching a non-jump instruction");
    }

    fn string_index(&mut self, text: &[u8]) -> u32 {
        if let Some(&index) = self.string_indices.get(text) {
            return index;
        }

        let index = self.string_pool.len() as u32;
        self.string_pool.push(text.to_vec());
        self.string_indices.insert(text.to_vec(), index);
        index
    }

    fn temp_string_index(&mut self, text: &str) -> usize {
        if let Some(index) = self
            .temporary_strings
            .iter()
            .position(|entry| entry == text)
        {
            return index;
        }

        self.temporary_strings.push(text.to_owned());
        self.temporary_strings.len() - 1
    }

    fn get_external(&mut self, name: &str) -> u32 {
        if let Some(index) = self.dependencies.iter().position(|entry| entry == name) {
            return index as u32;
        }

        self.dependencies.push(name.to_owned());
        (self.dependencies.len() - 1) as u32
    }

    fn find_function(&self, name: &str) -> Option<u16> {
        self.functions
            .iter()
            .position(|function| function.name == name)
            .map(|index| index as u16)
    }

    fn current_class(&self) -> Option<&ClassInfo> {
        self.functions[self.current]
            .class
            .map(|index| &self.classes[index])
    }

    fn is_member(&self, name: &str) -> bool {
        self.current_class()
            .is_some_and(|class| class.members.iter().any(|member| member == name))
    }

    fn is_method(&self, name: &str) -> bool {
        self.current_class()
            .is_some_and(|class| class.methods.iter().any(|method| method == name))
    }

    /* FUNCTIONS */

    fn compile_function(&mut self, index: usize) -> CompileResult<()> {
        self.current = index;
        self.current_function_name = Arc::from(self.functions[index].name);

        let decl = self.functions[index].decl;
        let start = self.current_offset();

        for parameter in &decl.parameters {
            let function = &mut self.functions[index];
            function.arguments.push(parameter.clone());
            function.create_local(parameter, decl.span)?;
        }

        self.compile_block(&decl.body)?;

        // Implicit `return this`; constructors rely on it.
        self.emit(Op::GetLocal(LOCAL_THIS), decl.span);
        self.emit(Op::Ret, decl.span);

        let handlers = std::mem::take(&mut self.current_handlers);
        self.script_functions.push(ScriptFunction {
            name: self.functions[index].name.to_owned(),
            arguments: ArgumentList::Explicit {
                count: decl.parameters.len(),
            },
            start,
            length: self.current_offset() - start,
            exception_handlers: handlers,
        });

        Ok(())
    }

    /* STATEMENTS */

    fn compile_block(&mut self, block: &'a Block) -> CompileResult<()> {
        for statement in &block.statements {
            self.compile_stmt(statement)?;
        }

        Ok(())
    }

    fn compile_stmt(&mut self, statement: &'a Stmt) -> CompileResult<()> {
        match statement {
            Stmt::Assert { expr, text, span } => {
                self.push_expr(expr)?;

                let index = self.string_index(text.as_bytes());
                self.emit(Op::Assert(index), *span);
            }

            Stmt::Assignment { target, value, span } => {
                if !matches!(
                    target,
                    Expr::Identifier { .. } | Expr::Index { .. } | Expr::Property { .. }
                ) {
                    return Err(CompileError::codegen(
                        "expected local variable, list item or member at left side of assignment",
                        *span,
                    ));
                }

                self.push_expr(value)?;
                self.pop_expr(target, false)?;
            }

            Stmt::Block(block) => {
                self.compile_block(block)?;
            }

            Stmt::Expression { expr, span } => {
                self.push_expr(expr)?;
                self.emit(Op::Drop, *span);
            }

            Stmt::For {
                init,
                condition,
                update,
                body,
                span,
            } => {
                self.compile_stmt(init)?;

                let begin = self.current_offset();
                self.push_expr(condition)?;
                let jump_to_end = self.emit(Op::JmpFalse(0), *span);

                self.compile_block(body)?;
                self.compile_stmt(update)?;

                self.emit(Op::Jmp(begin), *span);

                let end = self.current_offset();
                self.patch_jump(jump_to_end, end);
            }

            Stmt::Iterate {
                variable,
                range,
                body,
                span,
            } => {
                let iterator = self.functions[self.current].create_local("(iterator)", *span)?;
                let item = self.functions[self.current].get_or_alloc_local(variable, *span)?;

                // iterator = 0
                self.emit(Op::PushInt(0), *span);
                self.emit(Op::SetLocal(iterator), *span);

                // while iterator < range.length
                let begin = self.current_offset();
                self.emit(Op::GetLocal(iterator), *span);
                self.push_expr(range)?;
                let length = self.string_index(b"length");
                self.emit(Op::GetProperty(length), *span);
                self.emit(Op::Less, *span);
                let jump_to_end = self.emit(Op::JmpFalse(0), *span);

                // item = range[iterator]
                self.push_expr(range)?;
                self.emit(Op::GetLocal(iterator), *span);
                self.emit(Op::GetIndexed, *span);
                self.emit(Op::SetLocal(item), *span);

                self.compile_block(body)?;

                // iterator = iterator + 1
                self.emit(Op::GetLocal(iterator), *span);
                self.emit(Op::PushInt(1), *span);
                self.emit(Op::Add, *span);
                self.emit(Op::SetLocal(iterator), *span);

                self.emit(Op::Jmp(begin), *span);

                let end = self.current_offset();
                self.patch_jump(jump_to_end, end);
            }

            Stmt::If {
                condition,
                then_block,
                else_block,
                span,
            } => {
                // `if !x` inverts the branch instead of emitting lnot.
                let jump_to_else = if let Expr::Unary {
                    op: UnaryOp::Not,
                    operand,
                    ..
                } = condition
                {
                    self.push_expr(operand)?;
                    self.emit(Op::JmpTrue(0), *span)
                } else {
                    self.push_expr(condition)?;
                    self.emit(Op::JmpFalse(0), *span)
                };

                self.compile_block(then_block)?;

                let jump_to_end = match else_block {
                    Some(_) => Some(self.emit(Op::Jmp(0), *span)),
                    None => None,
                };

                let then_end = self.current_offset();

                if let Some(else_block) = else_block {
                    self.compile_block(else_block)?;
                }

                let else_end = self.current_offset();

                self.patch_jump(jump_to_else, then_end);
                if let Some(jump_to_end) = jump_to_end {
                    self.patch_jump(jump_to_end, else_end);
                }
            }

            Stmt::Return { expr, span } => {
                self.push_expr(expr)?;
                self.emit(Op::Ret, *span);
            }

            Stmt::Switch {
                expr,
                cases,
                default,
                span,
            } => {
                self.push_expr(expr)?;

                let table_index = self.switch_tables.len();
                self.switch_tables.push(SwitchTable {
                    cases: Vec::new(),
                    handlers: Vec::new(),
                });

                self.emit(Op::Switch(table_index as u32), *span);

                let mut end_jumps = Vec::new();

                for case in cases {
                    let handler = self.current_offset();

                    for value in &case.values {
                        let constant = literal_to_switch_value(value)?;
                        let table = &mut self.switch_tables[table_index];
                        table.cases.push(constant);
                        table.handlers.push(handler);
                    }

                    self.compile_block(&case.body)?;
                    end_jumps.push(self.emit(Op::Jmp(0), *span));
                }

                // The else handler; without a default block it points at the
                // end of the statement.
                let else_handler = self.current_offset();
                self.switch_tables[table_index].handlers.push(else_handler);

                if let Some(default) = default {
                    self.compile_block(default)?;
                }

                let end = self.current_offset();
                for jump in end_jumps {
                    self.patch_jump(jump, end);
                }
            }

            Stmt::Throw { expr, span } => {
                self.push_expr(expr)?;
                self.emit(Op::ThrowVar, *span);
            }

            Stmt::TryCatch {
                try_block,
                variable,
                catch_block,
                span,
            } => {
                let start = self.current_offset();
                self.compile_block(try_block)?;
                let length = self.current_offset() - start;

                let exit = self.emit(Op::Jmp(0), *span);
                let handler = self.current_offset();

                let slot = self.functions[self.current].get_or_alloc_local(variable, *span)?;
                self.emit(Op::SetLocal(slot), *span);

                self.compile_block(catch_block)?;

                let end = self.current_offset();
                self.patch_jump(exit, end);

                // Nested try blocks were pushed before this one, which is
                // exactly the innermost-first order the unwinder expects.
                self.current_handlers.push(HandlerRange {
                    start,
                    length,
                    handler,
                });
            }

            Stmt::While {
                condition,
                body,
                span,
            } => {
                let begin = self.current_offset();
                self.push_expr(condition)?;
                let jump_to_end = self.emit(Op::JmpFalse(0), *span);

                self.compile_block(body)?;
                self.emit(Op::Jmp(begin), *span);

                let end = self.current_offset();
                self.patch_jump(jump_to_end, end);
            }
        }

        Ok(())
    }

    /* EXPRESSIONS */

    /// Evaluates an expression so its result lands on the stack.
    fn push_expr(&mut self, expr: &'a Expr) -> CompileResult<()> {
        match expr {
            Expr::Binary {
                op,
                left,
                right,
                span,
            } => {
                self.push_expr(left)?;
                self.push_expr(right)?;
                self.emit(binary_op(*op), *span);
            }

            Expr::Unary { op, operand, span } => {
                self.push_expr(operand)?;
                self.emit(
                    match op {
                        UnaryOp::Negation => Op::Neg,
                        UnaryOp::Not => Op::LogNot,
                    },
                    *span,
                );
            }

            Expr::Call {
                callable,
                arguments,
                span,
            } => {
                for argument in arguments.iter().rev() {
                    self.push_expr(argument)?;
                }

                self.emit(Op::Args(arguments.len() as u32), *span);

                match &**callable {
                    // Direct method invocation on a receiver.
                    Expr::Property {
                        object,
                        name,
                        span: property_span,
                    } => {
                        self.push_expr(object)?;
                        let index = self.string_index(name.as_bytes());
                        self.emit(Op::Invoke(index), *property_span);
                    }

                    // Calling a sibling method of the current class.
                    Expr::Identifier {
                        name,
                        forced_local: false,
                        ..
                    } if self.is_method(name) => {
                        let class_name = self.current_class().expect("method context").name.clone();

                        let mangled = if class_name == *name {
                            name.clone()
                        } else {
                            format!("{class_name}|{name}")
                        };

                        let name_index = self.temp_string_index(&mangled);
                        self.emit_pending(PendingOp::UnknownCall { name_index }, *span);
                    }

                    // A plain by-symbol call; whether it names a function or
                    // an external is decided by the cook pass.
                    Expr::Identifier {
                        name,
                        forced_local: false,
                        ..
                    } if name != "_global"
                        && self.functions[self.current].try_get_local(name).is_none()
                        && !self.functions[self.current].is_argument(name)
                        && !self.is_member(name) =>
                    {
                        let name_index = self.temp_string_index(name);
                        self.emit_pending(PendingOp::UnknownCall { name_index }, *span);
                    }

                    _ => {
                        self.push_expr(callable)?;
                        self.emit(Op::CallVar, *span);
                    }
                }
            }

            Expr::Function(decl) => {
                self.functions.push(PendingFunction::from_decl(decl));

                let name_index = self.temp_string_index(&decl.name);
                self.emit_pending(
                    PendingOp::UnknownPush {
                        name_index,
                        function: self.current,
                    },
                    decl.span,
                );
            }

            Expr::Identifier {
                name,
                forced_local,
                span,
            } => {
                if name == "_global" {
                    self.emit(Op::PushGlobal, *span);
                    return Ok(());
                }

                let forced = *forced_local || self.functions[self.current].is_argument(name);

                if !forced && self.is_member(name) {
                    self.emit(Op::GetLocal(LOCAL_THIS), *span);
                    let index = self.string_index(name.as_bytes());
                    self.emit(Op::GetProperty(index), *span);
                } else {
                    let name_index = self.temp_string_index(name);
                    self.emit_pending(
                        PendingOp::UnknownPush {
                            name_index,
                            function: self.current,
                        },
                        *span,
                    );
                }
            }

            Expr::Index { range, index, span } => {
                self.push_expr(range)?;
                self.push_expr(index)?;
                self.emit(Op::GetIndexed, *span);
            }

            Expr::List { items, span } => {
                if items.len() == 1 {
                    self.push_expr(&items[0])?;
                } else {
                    for item in items {
                        self.push_expr(item)?;
                    }

                    self.emit(Op::NewList(items.len() as u32), *span);
                }
            }

            Expr::Literal(literal) => self.push_literal(literal)?,

            Expr::Property { object, name, span } => {
                self.push_expr(object)?;
                let index = self.string_index(name.as_bytes());
                self.emit(Op::GetProperty(index), *span);
            }
        }

        Ok(())
    }

    fn push_literal(&mut self, literal: &'a Literal) -> CompileResult<()> {
        match literal {
            Literal::Nil { span } => {
                self.emit(Op::PushNil, *span);
            }
            Literal::Boolean { value, span } => {
                self.emit(Op::PushBool(*value), *span);
            }
            Literal::Integer { value, span } => {
                self.emit(Op::PushInt(*value), *span);
            }
            Literal::Real { value, span } => {
                self.emit(Op::PushReal(*value), *span);
            }
            Literal::Str { value, span } => {
                let index = self.string_index(value);
                self.emit(Op::PushString(index), *span);
            }
            Literal::Object { properties, span } => {
                self.emit(Op::NewObj, *span);

                for (name, value) in properties {
                    self.push_expr(value)?;
                    self.emit(Op::Dup1, value.span());
                    let index = self.string_index(name.as_bytes());
                    self.emit(Op::SetMember(index), value.span());
                }
            }
        }

        Ok(())
    }

    /// Stores the stack top into an assignable expression.
    fn pop_expr(&mut self, target: &'a Expr, keep_on_stack: bool) -> CompileResult<()> {
        match target {
            Expr::Identifier {
                name,
                forced_local,
                span,
            } => {
                if name == "_global" {
                    return Err(CompileError::codegen("cannot assign to `_global`", *span));
                }

                if keep_on_stack {
                    self.emit(Op::Dup, *span);
                }

                let forced = *forced_local || self.functions[self.current].is_argument(name);

                if !forced && self.is_member(name) {
                    self.emit(Op::GetLocal(LOCAL_THIS), *span);
                    let index = self.string_index(name.as_bytes());
                    self.emit(Op::SetMember(index), *span);
                } else {
                    let slot = self.functions[self.current].get_or_alloc_local(name, *span)?;
                    self.emit(Op::SetLocal(slot), *span);
                }
            }

            Expr::Index { range, index, span } => {
                if keep_on_stack {
                    self.emit(Op::Dup, *span);
                }

                self.push_expr(range)?;
                self.push_expr(index)?;
                self.emit(Op::SetIndexed, *span);
            }

            Expr::Property { object, name, span } => {
                if keep_on_stack {
                    self.emit(Op::Dup, *span);
                }

                self.push_expr(object)?;
                let index = self.string_index(name.as_bytes());
                self.emit(Op::SetMember(index), *span);
            }

            _ => {
                return Err(CompileError::codegen(
                    "expected local variable, list item or member at left side of assignment",
                    target.span(),
                ))
            }
        }

        Ok(())
    }

    /* FIXUP */

    fn cook(&mut self) -> CompileResult<()> {
        for index in 0..self.code.len() {
            match self.code[index].op {
                PendingOp::Op(_) => {}

                PendingOp::UnknownCall { name_index } => {
                    let name = self.temporary_strings[name_index].clone();

                    let op = match self.find_function(&name) {
                        Some(function) => Op::CallFunc(function),
                        None => Op::CallExt(self.get_external(&name)),
                    };

                    self.code[index].op = PendingOp::Op(op);
                }

                PendingOp::UnknownPush {
                    name_index,
                    function,
                } => {
                    let name = self.temporary_strings[name_index].clone();

                    let op = match self.find_function(&name) {
                        Some(target) => Op::PushFunc(target),
                        None => {
                            // Not a function, so it is a local variable of
                            // the function that emitted the push.
                            let slot = self.functions[function]
                                .get_or_alloc_local(&name, Span::default())?;
                            Op::GetLocal(slot)
                        }
                    };

                    self.code[index].op = PendingOp::Op(op);
                }
            }
        }

        Ok(())
    }

    fn finish(self) -> CompileResult<CompiledModule> {
        let code = self
            .code
            .into_iter()
            .map(|instruction| Instruction {
                op: match instruction.op {
                    PendingOp::Op(op) => op,
                    _ => unreachable!("pending op survived the cook pass"),
                },
                origin: instruction.origin,
            })
            .collect();

        Ok(CompiledModule {
            dependencies: self.dependencies,
            functions: self.script_functions,
            code,
            string_pool: self.string_pool,
            switch_tables: self.switch_tables,
        })
    }
}

fn binary_op(op: crate::ast::BinaryOp) -> Op {
    use crate::ast::BinaryOp;

    match op {
        BinaryOp::Add => Op::Add,
        BinaryOp::Subtract => Op::Sub,
        BinaryOp::Divide => Op::Div,
        BinaryOp::Modulo => Op::Mod,
        BinaryOp::Multiply => Op::Mul,
        BinaryOp::And => Op::LogAnd,
        BinaryOp::Or => Op::LogOr,
        BinaryOp::Equals => Op::Eq,
        BinaryOp::Greater => Op::Grtr,
        BinaryOp::GreaterEq => Op::GrtrEq,
        BinaryOp::Less => Op::Less,
        BinaryOp::LessEq => Op::LessEq,
        BinaryOp::NotEquals => Op::Neq,
    }
}

fn literal_to_switch_value(literal: &Literal) -> CompileResult<SwitchValue> {
    match literal {
        Literal::Nil { .. } => Ok(SwitchValue::Nil),
        Literal::Boolean { value, .. } => Ok(SwitchValue::Boolean(*value)),
        Literal::Integer { value, .. } => Ok(SwitchValue::Integer(*value)),
        Literal::Real { value, .. } => Ok(SwitchValue::Real(*value)),
        Literal::Str { value, .. } => Ok(SwitchValue::String(value.clone())),
        Literal::Object { span, .. } => Err(CompileError::codegen(
            "switch cases must be constant values",
            *span,
        )),
    }
}
