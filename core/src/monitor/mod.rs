//! Interactive line-mode debugger: assemble (raw byte edit), disassemble,
//! breakpoints with compiled conditions, single-step/go, and binary
//! load/save. A [`Monitor`] is itself a [`Clockable`] that wraps a
//! [`Z80`] — it is registered with the [`crate::clock::Clock`] in the CPU's
//! place, so the monitor hook is an external collaborator (§9 "Callbacks")
//! rather than something the CPU core itself knows about.

pub mod disasm;
pub mod expr;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, Write};
use std::rc::Rc;

use crate::bus::AddressSpace;
use crate::clock::{Clockable, HALT};
use crate::cpu::z80::Z80;
use crate::device::ReadMode;
use crate::error::Error;
use crate::monitor::expr::{parse_number, Condition};
use crate::types::Address;

/// A breakpoint: always triggers if `condition` is `None`, otherwise only
/// when the compiled expression evaluates non-zero.
#[derive(Clone, Debug, Default)]
pub struct Breakpoint {
    pub condition: Option<Condition>,
    pub text: String,
}

enum Outcome {
    /// Stay in the interactive loop.
    Continue,
    /// Resume CPU execution (`go`/`step`).
    Resume,
    /// `quit`: the hosting application should exit after this clock halts.
    Quit,
}

/// Interactive CPU monitor. Generic over the I/O streams so tests can drive
/// it with an in-memory reader/writer instead of a real terminal.
pub struct Monitor<R, W> {
    input: R,
    output: W,
    cpu: Rc<RefCell<Z80>>,
    bus: Rc<AddressSpace>,
    breakpoints: BTreeMap<Address, Breakpoint>,
    /// Set externally (or by `step`) to force a break on the next tick.
    ebreak: bool,
    /// Tracks whether the previous command was `step`, so the prompt shows
    /// the disassembly/registers the way the reference monitor does.
    last_was_step: bool,
    exit_code: Option<i32>,
}

impl<R: BufRead, W: Write> Monitor<R, W> {
    pub fn new(input: R, output: W, cpu: Rc<RefCell<Z80>>, bus: Rc<AddressSpace>) -> Self {
        Self {
            input,
            output,
            cpu,
            bus,
            breakpoints: BTreeMap::new(),
            ebreak: false,
            last_was_step: false,
            exit_code: None,
        }
    }

    /// Force a break on the very next tick, regardless of breakpoints.
    pub fn request_break(&mut self) {
        self.ebreak = true;
    }

    /// Exit code the `quit` command was given, if any — surfaced for the
    /// host application to act on rather than calling `process::exit`
    /// directly from library code.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn add_breakpoint(&mut self, addr: Address, condition: Option<Condition>, text: String) {
        self.breakpoints.insert(addr, Breakpoint { condition, text });
    }

    pub fn del_breakpoint(&mut self, addr: Address) {
        self.breakpoints.remove(&addr);
    }

    fn breakpoint_hit(&self, addr: Address) -> bool {
        match self.breakpoints.get(&addr) {
            None => false,
            Some(bp) => match &bp.condition {
                None => true,
                Some(cond) => cond.evaluate(&self.cpu.borrow(), &self.bus),
            },
        }
    }

    fn to_addr(&mut self, s: &str, default: Address) -> Address {
        if s == "." {
            return default;
        }
        match parse_number(s) {
            Ok(v) => v as Address,
            Err(e) => {
                writeln!(self.output, "{e}").ok();
                default
            }
        }
    }

    fn to_count(&mut self, s: &str) -> Option<usize> {
        match parse_number(s) {
            Ok(v) => Some(v as usize),
            Err(e) => {
                writeln!(self.output, "{e}").ok();
                None
            }
        }
    }

    /// Enter the interactive loop. Returns `true` if the hosting clock
    /// should keep running CPU emulation, `false` if the session ended
    /// (EOF or `quit`).
    fn run_interactive(&mut self) -> bool {
        loop {
            if self.last_was_step {
                let pc = self.cpu.borrow().pc;
                self.print_disassembly(pc, 1, true);
                self.print_registers();
                writeln!(self.output).ok();
            }
            let pc = self.cpu.borrow().pc;
            write!(self.output, "${pc:04X}> ").ok();
            self.output.flush().ok();

            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => return false,
                Ok(_) => {}
            }
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let args: Vec<&str> = line.split_whitespace().collect();
            self.last_was_step = false;
            match self.dispatch(&args) {
                Outcome::Continue => continue,
                Outcome::Resume => return true,
                Outcome::Quit => return false,
            }
        }
    }

    fn dispatch(&mut self, args: &[&str]) -> Outcome {
        match args[0] {
            "assemble" | "a" => self.cmd_assemble(args),
            "disass" | "d" => self.cmd_disassemble(args),
            "dump" | "x" => self.cmd_dump(args),
            "regs" | "r" => {
                self.print_registers();
                Outcome::Continue
            }
            "mmap" | "m" => {
                let mut text = String::new();
                self.bus.dump(&mut text).ok();
                write!(self.output, "{text}").ok();
                Outcome::Continue
            }
            "bpadd" | "b" => self.cmd_bpadd(args),
            "bpdel" | "bd" => self.cmd_bpdel(args),
            "bpclear" | "bc" => {
                self.breakpoints.clear();
                Outcome::Continue
            }
            "bplist" | "bl" => self.cmd_bplist(),
            "go" | "g" => self.cmd_go(args),
            "si" | "s" => self.cmd_step(args),
            "load" | "l" => self.cmd_load(args),
            "save" | "w" => self.cmd_save(args),
            "loglevel" | "lv" => self.cmd_loglevel(args),
            "quit" | "q" => self.cmd_quit(args),
            "help" | "h" | "?" => {
                self.print_help();
                Outcome::Continue
            }
            other => {
                writeln!(self.output, "Invalid command: {other}").ok();
                Outcome::Continue
            }
        }
    }

    fn cmd_assemble(&mut self, args: &[&str]) -> Outcome {
        let pc = self.cpu.borrow().pc;
        let mut addr = pc;
        for a in &args[1..] {
            addr = self.to_addr(a, addr);
        }
        writeln!(self.output, "Entering edit mode. To finish write '.' or an empty line").ok();
        loop {
            write!(self.output, "${addr:04X}: ").ok();
            self.output.flush().ok();
            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim();
            if line.is_empty() || line == "." {
                break;
            }
            let mut bytes = Vec::new();
            let mut bad = false;
            for tok in line.split_whitespace() {
                match parse_number(tok) {
                    Ok(v) if v <= 0xFF => bytes.push(v as u8),
                    _ => {
                        writeln!(self.output, "Invalid value: {tok}").ok();
                        bad = true;
                        break;
                    }
                }
            }
            if bad {
                continue;
            }
            for b in bytes {
                self.bus.write(addr, b);
                addr = addr.wrapping_add(1);
            }
        }
        Outcome::Continue
    }

    fn print_disassembly(&mut self, start: Address, count: usize, show_pc: bool) {
        let pc = self.cpu.borrow().pc;
        let mut addr = start;
        for _ in 0..count {
            let (text, len) = disasm::disassemble_one(&self.bus, addr);
            let marker = if show_pc && addr == pc { " <" } else { "" };
            writeln!(self.output, "${addr:04X}: {text}{marker}").ok();
            addr = addr.wrapping_add(len.max(1));
        }
    }

    fn cmd_disassemble(&mut self, args: &[&str]) -> Outcome {
        let pc = self.cpu.borrow().pc;
        let mut addr = pc;
        let mut count = 16usize;
        if args.len() > 2 {
            match self.to_count(args[2]) {
                Some(c) => count = c,
                None => return Outcome::Continue,
            }
        }
        if args.len() > 1 {
            addr = self.to_addr(args[1], pc);
        }
        self.print_disassembly(addr, count, true);
        Outcome::Continue
    }

    fn cmd_dump(&mut self, args: &[&str]) -> Outcome {
        let pc = self.cpu.borrow().pc;
        let mut addr = pc;
        let mut count = 16usize;
        if args.len() > 2 {
            match self.to_count(args[2]) {
                Some(c) => count = c,
                None => return Outcome::Continue,
            }
        }
        if args.len() > 1 {
            addr = self.to_addr(args[1], pc);
        }
        let start = addr;
        for row in 0..count.div_ceil(16) {
            let row_addr = start.wrapping_add((row * 16) as u16);
            write!(self.output, "${row_addr:04X}: ").ok();
            let row_len = count.saturating_sub(row * 16).min(16);
            for i in 0..row_len {
                let v = self.bus.peek(row_addr.wrapping_add(i as u16));
                write!(self.output, "{v:02X} ").ok();
            }
            writeln!(self.output).ok();
        }
        Outcome::Continue
    }

    fn print_registers(&mut self) {
        let cpu = self.cpu.borrow();
        writeln!(
            self.output,
            "AF={:04X} BC={:04X} DE={:04X} HL={:04X} IX={:04X} IY={:04X}",
            cpu.get_af(),
            cpu.get_bc(),
            cpu.get_de(),
            cpu.get_hl(),
            cpu.ix,
            cpu.iy
        )
        .ok();
        writeln!(
            self.output,
            "SP={:04X} PC={:04X} I={:02X} R={:02X} IM={} IFF1={} IFF2={} HALT={}",
            cpu.sp, cpu.pc, cpu.i, cpu.r, cpu.im, cpu.iff1 as u8, cpu.iff2 as u8, cpu.halted as u8
        )
        .ok();
        let f = cpu.f;
        writeln!(
            self.output,
            "flags: S={} Z={} H={} V={} N={} C={}",
            (f >> 7) & 1,
            (f >> 6) & 1,
            (f >> 4) & 1,
            (f >> 2) & 1,
            (f >> 1) & 1,
            f & 1
        )
        .ok();
    }

    fn cmd_bpadd(&mut self, args: &[&str]) -> Outcome {
        if args.len() == 1 {
            return Outcome::Continue;
        }
        if matches!(args[1], "h" | "?" | "help") {
            writeln!(self.output, "{} help | h | ?", args[0]).ok();
            writeln!(self.output, "{} <addr> [<cond>]", args[0]).ok();
            writeln!(self.output).ok();
            writeln!(self.output, "<cond> = <val> <op> <val>").ok();
            writeln!(
                self.output,
                "<val>  = [*]{{[#][$]<u16> | register name}}  <op> = '<' '>' '<=' '>=' '==' '!=' '&' '|'"
            )
            .ok();
            return Outcome::Continue;
        }
        let pc = self.cpu.borrow().pc;
        let addr = self.to_addr(args[1], pc);
        if args.len() > 2 {
            let expr = args[2..].join(" ");
            match Condition::compile(&expr) {
                Ok(cond) => self.add_breakpoint(addr, Some(cond), expr),
                Err(e) => {
                    writeln!(self.output, "{e}").ok();
                }
            }
        } else {
            self.add_breakpoint(addr, None, String::new());
        }
        Outcome::Continue
    }

    fn cmd_bpdel(&mut self, args: &[&str]) -> Outcome {
        let pc = self.cpu.borrow().pc;
        for a in &args[1..] {
            let addr = self.to_addr(a, pc);
            self.del_breakpoint(addr);
        }
        Outcome::Continue
    }

    fn cmd_bplist(&mut self) -> Outcome {
        let pc = self.cpu.borrow().pc;
        for (addr, bp) in &self.breakpoints {
            let marker = if *addr == pc { " <" } else { "" };
            if bp.condition.is_some() {
                writeln!(self.output, "${addr:04X} {}{marker}", bp.text).ok();
            } else {
                writeln!(self.output, "${addr:04X}{marker}").ok();
            }
        }
        Outcome::Continue
    }

    fn cmd_go(&mut self, args: &[&str]) -> Outcome {
        if args.len() > 1 {
            let pc = self.cpu.borrow().pc;
            let addr = self.to_addr(args[1], pc);
            self.cpu.borrow_mut().pc = addr;
        }
        Outcome::Resume
    }

    fn cmd_step(&mut self, args: &[&str]) -> Outcome {
        if args.len() > 1 {
            let pc = self.cpu.borrow().pc;
            let addr = self.to_addr(args[1], pc);
            self.cpu.borrow_mut().pc = addr;
        }
        self.ebreak = true;
        self.last_was_step = true;
        Outcome::Resume
    }

    fn cmd_load(&mut self, args: &[&str]) -> Outcome {
        if args.len() < 2 {
            return Outcome::Continue;
        }
        let addr: Address = if args.len() > 2 {
            match parse_number(args[2]) {
                Ok(v) => v as Address,
                Err(e) => {
                    writeln!(self.output, "{e}").ok();
                    return Outcome::Continue;
                }
            }
        } else {
            0
        };
        match fs::read(args[1]) {
            Ok(bytes) => {
                for (i, b) in bytes.iter().enumerate() {
                    self.bus.write(addr.wrapping_add(i as u16), *b);
                }
                writeln!(
                    self.output,
                    "load: {} loaded at ${addr:04X}, size {} (${:04X})",
                    args[1],
                    bytes.len(),
                    bytes.len()
                )
                .ok();
            }
            Err(e) => {
                writeln!(self.output, "{}", Error::Io { path: args[1].to_string(), source: e }).ok();
            }
        }
        Outcome::Continue
    }

    fn cmd_save(&mut self, args: &[&str]) -> Outcome {
        if args.len() != 4 {
            writeln!(self.output, "{}", Error::InvalidArgument("expected: save <file> <start> <end>".into())).ok();
            return Outcome::Continue;
        }
        let start = match parse_number(args[2]) {
            Ok(v) => v as Address,
            Err(e) => {
                writeln!(self.output, "{e}").ok();
                return Outcome::Continue;
            }
        };
        let end = match parse_number(args[3]) {
            Ok(v) => v as Address,
            Err(e) => {
                writeln!(self.output, "{e}").ok();
                return Outcome::Continue;
            }
        };
        if end < start {
            writeln!(self.output, "{}", Error::InvalidArgument("end address smaller than start address".into())).ok();
            return Outcome::Continue;
        }
        let mut bytes = Vec::with_capacity((end - start + 1) as usize);
        let mut addr = start;
        loop {
            bytes.push(self.bus.peek(addr));
            if addr == end {
                break;
            }
            addr = addr.wrapping_add(1);
        }
        if let Err(e) = fs::write(args[1], &bytes) {
            writeln!(self.output, "{}", Error::Io { path: args[1].to_string(), source: e }).ok();
        }
        Outcome::Continue
    }

    fn cmd_loglevel(&mut self, args: &[&str]) -> Outcome {
        if args.len() != 2 {
            writeln!(self.output, "{}", log::max_level()).ok();
        } else {
            match args[1].parse::<log::LevelFilter>() {
                Ok(level) => log::set_max_level(level),
                Err(_) => {
                    writeln!(self.output, "{}", Error::InvalidArgument(format!("invalid log level: {}", args[1]))).ok();
                }
            }
        }
        Outcome::Continue
    }

    fn cmd_quit(&mut self, args: &[&str]) -> Outcome {
        if args.len() > 1 {
            let code: i32 = args[1].parse().unwrap_or(0);
            writeln!(self.output, "Emulator terminated with exit code: {code}").ok();
            self.exit_code = Some(code);
        }
        Outcome::Quit
    }

    fn print_help(&mut self) {
        let rows: &[(&str, &str, &str)] = &[
            ("a", "assemble [addr|.]", "Enter raw-byte edit mode at addr"),
            ("d", "disass [addr [n]]", "Disassemble n instructions from addr"),
            ("x", "dump [addr [n]]", "Hex dump n bytes from addr"),
            ("r", "regs", "Show registers"),
            ("m", "mmap", "Show memory map"),
            ("b", "bpadd addr [cond]", "Add an optional-conditional breakpoint"),
            ("bd", "bpdel addr", "Delete a breakpoint"),
            ("bc", "bpclear", "Clear all breakpoints"),
            ("bl", "bplist", "List breakpoints"),
            ("g", "go [addr]", "Resume execution"),
            ("s", "si [addr]", "Single step"),
            ("l", "load file [addr]", "Load a binary into memory"),
            ("w", "save file start end", "Save a memory range to a file"),
            ("lv", "loglevel [lv]", "Get or set the log level"),
            ("q", "quit [exitcode]", "Exit the monitor"),
            ("h", "help", "This text"),
        ];
        writeln!(self.output, "Monitor Commands:").ok();
        for (short, usage, help) in rows {
            writeln!(self.output, "{short:>3} | {usage:<24}{help}").ok();
        }
        writeln!(self.output, "values without a prefix or prefixed by '$' are hexadecimal").ok();
        writeln!(self.output, "values prefixed only by '#' are decimal").ok();
    }
}

/// The monitor is driven by the clock in place of the CPU it wraps: each
/// tick either steps the CPU by one instruction, or — if `ebreak` is set or
/// a breakpoint's condition fires at the current PC — hands control to the
/// interactive loop first (§4.5 "Monitor integration").
impl<R: BufRead, W: Write> Clockable for Monitor<R, W> {
    fn tick(&mut self) -> u32 {
        let pc = self.cpu.borrow().pc;
        if self.ebreak || self.breakpoint_hit(pc) {
            self.ebreak = false;
            if !self.run_interactive() {
                return HALT;
            }
        }
        self.cpu.borrow_mut().tick()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::DeviceMapEntry;
    use std::io::Cursor;

    struct FlatRam(Vec<u8>);
    impl crate::device::Device for FlatRam {
        fn read(&mut self, addr: u16, _mode: ReadMode) -> u8 {
            self.0[addr as usize]
        }
        fn write(&mut self, addr: u16, value: u8) {
            self.0[addr as usize] = value;
        }
        fn size(&self) -> usize {
            self.0.len()
        }
    }

    fn harness() -> (Rc<RefCell<Z80>>, Rc<AddressSpace>) {
        let ram = Rc::new(RefCell::new(FlatRam(vec![0; 0x10000])));
        let bus = Rc::new(AddressSpace::new(
            0x10000,
            vec![DeviceMapEntry::new(ram.clone(), 0)],
            vec![DeviceMapEntry::new(ram, 0)],
        ));
        let cpu = Rc::new(RefCell::new(Z80::new(bus.clone())));
        (cpu, bus)
    }

    fn monitor_with(input: &str) -> Monitor<Cursor<Vec<u8>>, Vec<u8>> {
        let (cpu, bus) = harness();
        Monitor::new(Cursor::new(input.as_bytes().to_vec()), Vec::new(), cpu, bus)
    }

    #[test]
    fn assemble_writes_bytes_into_memory() {
        let mut mon = monitor_with("00 C3 34 12\n.\n");
        mon.cmd_assemble(&["a"]);
        assert_eq!(mon.bus.peek(0), 0x00);
        assert_eq!(mon.bus.peek(1), 0xC3);
        assert_eq!(mon.bus.peek(2), 0x34);
        assert_eq!(mon.bus.peek(3), 0x12);
    }

    #[test]
    fn breakpoint_fires_unconditionally_at_address() {
        let mut mon = monitor_with("");
        mon.add_breakpoint(0x1234, None, String::new());
        assert!(mon.breakpoint_hit(0x1234));
        assert!(!mon.breakpoint_hit(0x1235));
    }

    #[test]
    fn conditional_breakpoint_respects_condition() {
        let mut mon = monitor_with("");
        let cond = Condition::compile("a == $80").unwrap();
        mon.add_breakpoint(0x2000, Some(cond), "a == $80".to_string());
        assert!(!mon.breakpoint_hit(0x2000));
        mon.cpu.borrow_mut().a = 0x80;
        assert!(mon.breakpoint_hit(0x2000));
    }

    #[test]
    fn del_breakpoint_removes_it() {
        let mut mon = monitor_with("");
        mon.add_breakpoint(0x10, None, String::new());
        mon.del_breakpoint(0x10);
        assert!(!mon.breakpoint_hit(0x10));
    }

    #[test]
    fn go_resumes_and_can_relocate_pc() {
        let mut mon = monitor_with("");
        match mon.dispatch(&["go", "$8000"]) {
            Outcome::Resume => {}
            _ => panic!("expected resume"),
        }
        assert_eq!(mon.cpu.borrow().pc, 0x8000);
    }

    #[test]
    fn step_sets_ebreak_so_the_monitor_regains_control() {
        let mut mon = monitor_with("");
        match mon.dispatch(&["si"]) {
            Outcome::Resume => {}
            _ => panic!("expected resume"),
        }
        assert!(mon.ebreak);
    }

    #[test]
    fn quit_reports_exit_code() {
        let mut mon = monitor_with("");
        match mon.dispatch(&["quit", "7"]) {
            Outcome::Quit => {}
            _ => panic!("expected quit"),
        }
        assert_eq!(mon.exit_code(), Some(7));
    }

    #[test]
    fn save_then_load_round_trips_a_memory_range() {
        let mut mon = monitor_with("");
        for (i, b) in [0xAAu8, 0xBB, 0xCC].iter().enumerate() {
            mon.bus.write(0x100 + i as u16, *b);
        }
        let path = std::env::temp_dir().join("tubecore-monitor-save-test.bin");
        mon.dispatch(&["save", path.to_str().unwrap(), "$100", "$102"]);
        mon.dispatch(&["load", path.to_str().unwrap(), "$200"]);
        assert_eq!(mon.bus.peek(0x200), 0xAA);
        assert_eq!(mon.bus.peek(0x201), 0xBB);
        assert_eq!(mon.bus.peek(0x202), 0xCC);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn tick_steps_cpu_when_no_break_is_pending() {
        let (cpu, bus) = harness();
        bus.write(0, 0x00); // NOP
        let mut mon = Monitor::new(Cursor::new(Vec::new()), Vec::new(), cpu.clone(), bus);
        let cycles = mon.tick();
        assert!(cycles > 0);
        assert_eq!(cpu.borrow().pc, 1);
    }

    #[test]
    fn tick_enters_monitor_on_breakpoint_then_resumes_on_go() {
        let (cpu, bus) = harness();
        bus.write(0, 0x00); // NOP at the breakpoint address
        let mut mon = Monitor::new(Cursor::new(b"go\n".to_vec()), Vec::new(), cpu.clone(), bus);
        mon.add_breakpoint(0, None, String::new());
        let cycles = mon.tick();
        assert!(cycles > 0);
        assert_eq!(cpu.borrow().pc, 1);
    }

    #[test]
    fn tick_halts_the_clock_on_quit() {
        let (cpu, bus) = harness();
        let mut mon = Monitor::new(Cursor::new(b"quit\n".to_vec()), Vec::new(), cpu, bus);
        mon.add_breakpoint(0, None, String::new());
        assert_eq!(mon.tick(), HALT);
    }
}
