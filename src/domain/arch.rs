//! Target architecture registry.
//!
//! A fixed, closed set of architecture profiles (toolchain names, QEMU
//! invocation, boot protocol, register set) carried as reference data
//! consumed by prompt construction and the build/test validators, not
//! behavior this crate decides.

use serde::{Deserialize, Serialize};

/// Complete profile for one target architecture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchProfile {
    pub name: &'static str,
    pub display_name: &'static str,

    pub cc: &'static str,
    pub asm: &'static str,
    pub ld: &'static str,
    pub asm_syntax: &'static str,
    pub asm_format: &'static str,
    pub cflags: &'static [&'static str],

    pub qemu: &'static str,
    pub qemu_machine: &'static str,
    pub qemu_cpu: &'static str,
    pub qemu_extra: &'static [&'static str],

    pub boot_protocol: &'static str,
    pub firmware_type: &'static str,

    pub asm_language: &'static str,

    pub register_set: &'static str,
    pub page_table_format: &'static str,

    pub arch_spec_file: &'static str,

    pub core_drivers: &'static [&'static str],
}

const X86_64: ArchProfile = ArchProfile {
    name: "x86_64",
    display_name: "x86_64 (AMD64)",
    cc: "x86_64-elf-gcc",
    asm: "nasm",
    ld: "x86_64-elf-ld",
    asm_syntax: "nasm",
    asm_format: "-f elf64",
    cflags: &["-ffreestanding", "-mno-red-zone", "-fno-exceptions", "-mcmodel=kernel"],
    qemu: "qemu-system-x86_64",
    qemu_machine: "",
    qemu_cpu: "",
    qemu_extra: &[],
    boot_protocol: "multiboot2",
    firmware_type: "acpi",
    asm_language: "NASM x86_64 Assembly",
    register_set: "RAX-R15, RSP, RBP, RFLAGS, CR3",
    page_table_format: "4-level (PML4 -> PDPT -> PD -> PT)",
    arch_spec_file: "arch/x86_64.md",
    core_drivers: &["serial_16550", "vga_text", "pit_8254", "ps2_keyboard"],
};

const AARCH64: ArchProfile = ArchProfile {
    name: "aarch64",
    display_name: "AArch64 (ARM64)",
    cc: "aarch64-elf-gcc",
    asm: "aarch64-elf-as",
    ld: "aarch64-elf-ld",
    asm_syntax: "gas",
    asm_format: "",
    cflags: &["-ffreestanding", "-mgeneral-regs-only", "-fno-exceptions"],
    qemu: "qemu-system-aarch64",
    qemu_machine: "virt",
    qemu_cpu: "cortex-a53",
    qemu_extra: &["-nographic"],
    boot_protocol: "dtb",
    firmware_type: "device_tree",
    asm_language: "AArch64 Assembly (GNU AS)",
    register_set: "X0-X30, SP, LR(X30), FP(X29), TTBR0/TTBR1",
    page_table_format: "4-level translation tables (4KB granule)",
    arch_spec_file: "arch/aarch64.md",
    core_drivers: &["pl011_uart", "gicv2", "arm_timer"],
};

const RISCV64: ArchProfile = ArchProfile {
    name: "riscv64",
    display_name: "RISC-V 64-bit",
    cc: "riscv64-elf-gcc",
    asm: "riscv64-elf-as",
    ld: "riscv64-elf-ld",
    asm_syntax: "gas",
    asm_format: "",
    cflags: &["-ffreestanding", "-fno-exceptions", "-march=rv64gc", "-mabi=lp64d"],
    qemu: "qemu-system-riscv64",
    qemu_machine: "virt",
    qemu_cpu: "",
    qemu_extra: &["-bios", "default", "-nographic"],
    boot_protocol: "sbi+dtb",
    firmware_type: "device_tree",
    asm_language: "RISC-V Assembly (GNU AS)",
    register_set: "x0-x31 (a0-a7, s0-s11, t0-t6), satp CSR",
    page_table_format: "Sv39 3-level paging",
    arch_spec_file: "arch/riscv64.md",
    core_drivers: &["ns16550_uart", "plic", "clint_timer"],
};

const ARCH_PROFILES: &[ArchProfile] = &[X86_64, AARCH64, RISCV64];

/// Raised when an architecture name isn't in the registry.
#[derive(Debug, thiserror::Error)]
#[error("unsupported architecture '{requested}'. supported: {supported}")]
pub struct UnknownArch {
    requested: String,
    supported: String,
}

/// Look up a profile by name, e.g. `"aarch64"`.
pub fn get_arch_profile(arch: &str) -> Result<ArchProfile, UnknownArch> {
    ARCH_PROFILES.iter().find(|p| p.name == arch).cloned().ok_or_else(|| UnknownArch {
        requested: arch.to_string(),
        supported: list_architectures().join(", "),
    })
}

/// Every supported architecture name, sorted.
pub fn list_architectures() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = ARCH_PROFILES.iter().map(|p| p.name).collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_architectures_resolve() {
        assert_eq!(get_arch_profile("x86_64").unwrap().cc, "x86_64-elf-gcc");
        assert_eq!(get_arch_profile("aarch64").unwrap().qemu_machine, "virt");
        assert_eq!(get_arch_profile("riscv64").unwrap().boot_protocol, "sbi+dtb");
    }

    #[test]
    fn unknown_architecture_errors() {
        assert!(get_arch_profile("sparc").is_err());
    }

    #[test]
    fn list_is_sorted() {
        assert_eq!(list_architectures(), vec!["aarch64", "riscv64", "x86_64"]);
    }
}
