//! Reference driver: compile a program file, optionally disassemble it, and
//! run its `.main` to completion.
//!
//! Exit code: 0 on a normal return; if the script raised and the exception
//! object carries an integer `exitCode` property, that value; 1 on any
//! other failure.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;

use quill_compiler::{compile_source, optimize, CodegenOptions};
use quill_vm::disasm::disassemble;
use quill_vm::heap::PropName;
use quill_vm::runtime::display_value;
use quill_vm::{runtime, ActivationContext, NativeCallContext, State, Value, Vm};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(
    name = "quill",
    about = "Quill scripting language driver",
    disable_version_flag = true
)]
struct Cli {
    /// Compile only; do not run.
    #[arg(short = 'c')]
    compile_only: bool,

    /// Write disassembly to PATH, or to stdout when the flag carries no
    /// path (use the attached form: -dout.txt). Implies -c.
    #[arg(short = 'd', value_name = "PATH", num_args = 0..=1, default_missing_value = "")]
    disassemble: Option<String>,

    /// Add a module search path (repeatable).
    #[arg(short = 'I', value_name = "PATH")]
    include: Vec<PathBuf>,

    /// Output path; overrides the disassembly destination.
    #[arg(short = 'o', value_name = "PATH")]
    output: Option<PathBuf>,

    /// Optimization level: 0 disables the peephole pass.
    #[arg(short = 'O', value_name = "LEVEL", default_value_t = 1)]
    optimize: u8,

    /// Suppress banners and exception dumps.
    #[arg(short = 's')]
    silent: bool,

    /// Print version information.
    #[arg(short = 'V')]
    version: bool,

    /// Program file; remaining positionals become the script's argv.
    program: Option<String>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    script_args: Vec<String>,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match run_program(cli) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("quill: {error:#}");
            std::process::exit(1);
        }
    }
}

/// Looks for the program in the working directory first, then in each -I
/// path in order.
fn resolve_program(program: &str, include: &[PathBuf]) -> PathBuf {
    let direct = PathBuf::from(program);

    if direct.exists() || direct.is_absolute() {
        return direct;
    }

    for base in include {
        let candidate = base.join(program);
        if candidate.exists() {
            return candidate;
        }
    }

    direct
}

/// `print(...)`: writes each argument's display form, then a newline.
fn native_print(ctx: &mut NativeCallContext<'_, '_>) {
    let mut line = String::new();

    for index in 0..ctx.num_args() {
        let argument = ctx.arg(index);
        line.push_str(&display_value(ctx.heap(), argument, 0));
    }

    println!("{line}");
}

fn run_program(cli: Cli) -> Result<i32> {
    if cli.version {
        println!("Quill {VERSION}");
    }

    let Some(program) = &cli.program else {
        if !cli.version {
            println!("quill: no input given.");
            return Ok(1);
        }
        return Ok(0);
    };

    let path = resolve_program(program, &cli.include);
    let source = fs::read_to_string(&path)
        .with_context(|| format!("cannot read `{}`", path.display()))?;

    let options = CodegenOptions {
        unit_name: path.display().to_string(),
        debug_info: true,
    };

    let mut module = compile_source(&source, &options)
        .map_err(|error| anyhow::anyhow!("compilation failed: {error}"))?;

    if cli.optimize != 0 {
        let removed = optimize(&mut module);
        log::debug!("optimizer removed {removed} instructions");
    }

    if let Some(target) = &cli.disassemble {
        let text = disassemble(&module);

        let destination = if target.is_empty() {
            cli.output.clone()
        } else {
            Some(PathBuf::from(target))
        };

        match destination {
            Some(path) => fs::write(&path, text)
                .with_context(|| format!("cannot write `{}`", path.display()))?,
            None => {
                if !cli.silent {
                    println!("; disassembling '{program}'");
                    println!();
                }
                print!("{text}");
            }
        }

        return Ok(0);
    }

    if cli.compile_only {
        return Ok(0);
    }

    execute_module(&module, &path, &cli)
}

fn execute_module(
    module: &quill_vm::bytecode::CompiledModule,
    path: &Path,
    cli: &Cli,
) -> Result<i32> {
    let mut vm = Vm::new();
    vm.register_callback("print", native_print)
        .expect("registry empty");

    let module_index = match vm.load_module(module) {
        Ok(index) => index,
        Err(error) => bail!("cannot load `{}`: {error}", path.display()),
    };

    // Expose the script argv as a read-only `args` list on the global.
    {
        let global = vm.global().container_handle().expect("global object");
        let heap = vm.heap_mut();
        let list = heap.new_list(cli.script_args.len());
        let list_handle = list.container_handle().expect("fresh list");

        for argument in &cli.script_args {
            let value = heap.new_string(argument.as_bytes());
            heap.list_add_item(list_handle, value);
        }

        heap.object_set_property(global, &PropName::new(b"args"), list, true);
    }

    let mut ctx = ActivationContext::new();

    let exit_code = if vm.call_main_function(&mut ctx, module_index) {
        vm.execute(&mut ctx);

        while ctx.state() == State::Suspended {
            ctx.resume();
            vm.execute(&mut ctx);
        }

        match ctx.state() {
            State::RaisedException => exception_exit_code(&mut vm, &mut ctx, cli.silent),
            _ => 0,
        }
    } else {
        exception_exit_code(&mut vm, &mut ctx, cli.silent)
    };

    ctx.teardown(vm.heap_mut());
    vm.shutdown();

    Ok(exit_code)
}

fn exception_exit_code(vm: &mut Vm, ctx: &mut ActivationContext, silent: bool) -> i32 {
    let exception = ctx.exception();

    let mut machine = vm.machine();
    let exit_code = runtime::get_property(
        &mut machine,
        ctx,
        exception,
        &PropName::new(b"exitCode"),
        false,
    );

    if let Some(value) = exit_code {
        machine.heap.release(value);

        if let Value::Integer(code) = value {
            return code as i32;
        }
    }

    if !silent {
        eprintln!(" -- An exception occurred:");
        eprintln!("{}", display_value(machine.heap, exception, 0));
    }

    1
}
