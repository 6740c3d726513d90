//! A tiny textual format for describing one litmus test, hand-rolled since
//! the enumerator core treats the instruction set and the program as
//! external inputs (spec §1) and carries no parser of its own. Not derived
//! from any upstream litmus-test syntax; just enough structure to drive
//! `litmus-core` from the command line.
//!
//! A block is the unit `litmus-core::driver` jumps to (`jmp`/`jz` always
//! target a block's first instruction — see `Program::entry_address`), so
//! this format names blocks directly rather than inventing intra-block
//! labels:
//!
//! ```text
//! init x=0 y=0
//! observe x y
//!
//! block T0
//!   store x, 1
//!   store y, 1
//! start thread 0 at T0
//!
//! block T1
//!   load r0, y
//!   load r1, x
//! start thread 1 at T1
//!
//! block L
//!   load r0, x
//!   jz r0, L
//! start thread 2 at L
//! ```

use anyhow::{bail, Context};
use litmus_core::constraint::{InitialState, Label};
use litmus_core::driver::{Address, CodeBlock, Program, StartPoint};
use litmus_core::isa::{Instr, Source};
use litmus_core::location::{RegId, ThreadId};

/// Everything `litmus_core::glommed_event_structures` needs, parsed out of
/// one litmus file.
pub struct ParsedTest {
    pub program: Program<Instr>,
    pub starts: Vec<StartPoint>,
    pub init: InitialState,
    pub observed: Vec<i64>,
}

pub fn parse(text: &str) -> anyhow::Result<ParsedTest> {
    let mut program = Program::new();
    let mut starts = Vec::new();
    let mut init = InitialState::new();
    let mut observed = Vec::new();

    let mut current_block: Option<(Label, Vec<(Address, Instr)>)> = None;

    for (lineno, raw) in text.lines().enumerate() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        let lineno = lineno + 1;

        if let Some(rest) = line.strip_prefix("init") {
            for assignment in rest.split_whitespace() {
                let (addr, value) = assignment
                    .split_once('=')
                    .with_context(|| format!("line {lineno}: malformed `init` assignment `{assignment}`"))?;
                init.set(parse_i64(addr, lineno)?, parse_i64(value, lineno)?);
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("observe") {
            for addr in rest.split_whitespace() {
                observed.push(parse_i64(addr, lineno)?);
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("start thread") {
            let (thread_str, block_str) = rest
                .trim()
                .split_once("at")
                .with_context(|| format!("line {lineno}: expected `start thread <id> at <block>`"))?;
            let thread: u32 = thread_str
                .trim()
                .parse()
                .with_context(|| format!("line {lineno}: malformed thread id"))?;
            starts.push(StartPoint {
                thread: ThreadId(thread),
                entry: Label(block_str.trim().to_string()),
            });
            continue;
        }

        if let Some(rest) = line.strip_prefix("block") {
            if let Some((label, body)) = current_block.take() {
                program.insert_block(label, CodeBlock::new(body));
            }
            let name = rest.trim();
            if name.is_empty() {
                bail!("line {lineno}: `block` needs a name");
            }
            current_block = Some((Label(name.to_string()), Vec::new()));
            continue;
        }

        let (label, body) = current_block
            .as_mut()
            .with_context(|| format!("line {lineno}: instruction `{line}` outside any `block`"))?;
        let address = Address(body.len() as u32);
        let instr = parse_instr(line, lineno)
            .with_context(|| format!("in block `{}`", label.0))?;
        body.push((address, instr));
    }
    if let Some((label, body)) = current_block.take() {
        program.insert_block(label, CodeBlock::new(body));
    }

    if starts.is_empty() {
        bail!("litmus file declares no `start thread` directives");
    }

    Ok(ParsedTest {
        program,
        starts,
        init,
        observed,
    })
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(i) => &line[..i],
        None => line,
    }
}

fn parse_i64(s: &str, lineno: usize) -> anyhow::Result<i64> {
    s.trim()
        .parse()
        .with_context(|| format!("line {lineno}: expected an integer, got `{s}`"))
}

fn parse_reg(s: &str, lineno: usize) -> anyhow::Result<RegId> {
    let s = s.trim();
    let digits = s
        .strip_prefix('r')
        .with_context(|| format!("line {lineno}: expected a register like `r0`, got `{s}`"))?;
    Ok(RegId(digits.parse().with_context(|| {
        format!("line {lineno}: malformed register `{s}`")
    })?))
}

fn parse_source(s: &str, lineno: usize) -> anyhow::Result<Source> {
    let s = s.trim();
    if s.starts_with('r') && s[1..].chars().all(|c| c.is_ascii_digit()) && s.len() > 1 {
        Ok(Source::Reg(parse_reg(s, lineno)?))
    } else {
        Ok(Source::Imm(parse_i64(s, lineno)?))
    }
}

fn parse_instr(line: &str, lineno: usize) -> anyhow::Result<Instr> {
    let (op, rest) = line
        .split_once(char::is_whitespace)
        .unwrap_or((line, ""));
    let args: Vec<&str> = if rest.trim().is_empty() {
        Vec::new()
    } else {
        rest.split(',').map(str::trim).collect()
    };

    match op {
        "mov" => {
            let [dst, imm] = args_n(&args, lineno, "mov r<n>, <imm>")?;
            Ok(Instr::Mov(parse_reg(dst, lineno)?, parse_i64(imm, lineno)?))
        }
        "load" => {
            let [dst, addr] = args_n(&args, lineno, "load r<n>, <addr>")?;
            Ok(Instr::Load(parse_reg(dst, lineno)?, parse_i64(addr, lineno)?))
        }
        "store" => {
            let [addr, src] = args_n(&args, lineno, "store <addr>, <imm|r<n>>")?;
            Ok(Instr::Store(parse_i64(addr, lineno)?, parse_source(src, lineno)?))
        }
        "fence" => Ok(Instr::Fence),
        "jmp" => {
            let [target] = args_n(&args, lineno, "jmp <block>")?;
            Ok(Instr::Jmp(Label(target.to_string())))
        }
        "jz" => {
            let [reg, target] = args_n(&args, lineno, "jz r<n>, <block>")?;
            Ok(Instr::JmpZero(parse_reg(reg, lineno)?, Label(target.to_string())))
        }
        other => bail!("line {lineno}: unknown instruction `{other}`"),
    }
}

fn args_n<'a, const N: usize>(
    args: &[&'a str],
    lineno: usize,
    usage: &str,
) -> anyhow::Result<[&'a str; N]> {
    <[&str; N]>::try_from(args).map_err(|_| {
        anyhow::anyhow!("line {lineno}: expected `{usage}`, got {} argument(s)", args.len())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_store_buffering_style_test() {
        let text = r#"
            init x=0 y=0
            observe x y

            block T0
              store x, 1
              load r0, y
            start thread 0 at T0

            block T1
              store y, 1
              load r0, x
            start thread 1 at T1
        "#;
        let parsed = parse(text).expect("valid litmus file");
        assert_eq!(parsed.starts.len(), 2);
        assert_eq!(parsed.observed, vec![0, 1]);
        assert_eq!(parsed.init.get(0), 0);
        let block = parsed.program.block(&Label("T0".to_string())).unwrap();
        assert_eq!(block.instructions.len(), 2);
    }

    #[test]
    fn rejects_instructions_outside_any_block() {
        let text = "store 0, 1\n";
        assert!(parse(text).is_err());
    }

    #[test]
    fn rejects_unknown_instructions() {
        let text = "block T0\n  frobnicate\nstart thread 0 at T0\n";
        assert!(parse(text).is_err());
    }

    #[test]
    fn parse_source_picks_register_over_immediate() {
        assert_eq!(parse_source("r3", 1).unwrap(), Source::Reg(RegId(3)));
        assert_eq!(parse_source("42", 1).unwrap(), Source::Imm(42));
    }
}
