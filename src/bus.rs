//! The CPU's capability interface onto memory, ports, and interrupts.
//!
//! `spec.md` §9 asks for these five operations to stay a capability
//! interface rather than the CPU owning a concrete bus type, so `Cpu::step`
//! takes `&mut dyn Bus` rather than a struct reference. This is the one
//! deliberate structural departure from the teacher's own
//! `Cpu::step(&mut self, bus: &mut Bus)`, which passes an owned concrete
//! struct; the trait-object seam is also precedented in this pack by
//! `christiankuhl-em68k`'s `Device` trait (`src/devices.rs`).

/// The five hooks an 8080 `Cpu` needs from its environment.
pub trait Bus {
    /// Read a byte for data purposes; tags coverage READ.
    fn read(&mut self, addr: u16) -> u8;
    /// Read a byte as part of instruction fetch; tags coverage EXEC.
    fn fetch(&mut self, addr: u16) -> u8;
    /// Write a byte; tags coverage WRITE.
    fn write(&mut self, addr: u16, value: u8);
    /// Read an I/O port.
    fn port_in(&mut self, port: u8) -> u8;
    /// Write an I/O port.
    fn port_out(&mut self, port: u8, value: u8);
    /// Compose the interrupt-acknowledge opcode (an RST instruction, or 0
    /// if no line is asserted — see `peripherals::interrupt`).
    fn interrupt_acknowledge(&mut self) -> u8;
}
