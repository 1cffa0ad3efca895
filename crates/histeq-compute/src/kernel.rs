use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicU32, AtomicU8};

use crate::buffer::{AccessMode, Buffer, BufferMemory, DeviceElement, ElementKind};
use crate::error::{ComputeError, KernelFault};

/// The body of a kernel, executed once per work-group.
///
/// A body loops over the work-items of its group with [`WorkGroup::global_ids`].
/// Work-groups run concurrently and in no defined order.
pub type KernelFn = fn(&WorkGroup<'_>) -> Result<(), KernelFault>;

/// The kind of a kernel parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// A buffer of the given element type, accessed as declared.
    Buffer {
        /// element type of the buffer
        kind: ElementKind,
        /// how the kernel accesses the buffer
        access: AccessMode,
    },
    /// An unsigned 32-bit scalar.
    Scalar,
}

/// A named kernel: its signature and its body.
#[derive(Clone, Copy)]
pub struct KernelDef {
    /// Identifier the kernel is looked up by.
    pub name: &'static str,
    /// Declared parameters, in binding order.
    pub params: &'static [ParamKind],
    /// The work-group body.
    pub body: KernelFn,
}

impl fmt::Debug for KernelDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// An argument bound to a kernel parameter.
#[derive(Debug, Clone)]
pub enum KernelArg {
    /// A buffer argument.
    Buffer {
        /// storage of the buffer
        memory: BufferMemory,
        /// access mode the buffer was created with
        access: AccessMode,
    },
    /// A scalar argument.
    Scalar(u32),
}

impl<T: DeviceElement> From<&Buffer<T>> for KernelArg {
    fn from(buffer: &Buffer<T>) -> Self {
        KernelArg::Buffer {
            memory: buffer.memory(),
            access: buffer.access(),
        }
    }
}

impl From<u32> for KernelArg {
    fn from(value: u32) -> Self {
        KernelArg::Scalar(value)
    }
}

/// A 1-D dispatch range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdRange {
    /// Total number of work-items.
    pub global: usize,
    /// Work-items per work-group. `None` lets the device choose.
    pub local: Option<usize>,
}

impl NdRange {
    /// A range of `global` work-items with a device-chosen group size.
    pub fn new(global: usize) -> Self {
        Self {
            global,
            local: None,
        }
    }

    /// Set the number of work-items per work-group.
    pub fn with_local(mut self, local: usize) -> Self {
        self.local = Some(local);
        self
    }

    /// Resolve the work-group size for a device.
    ///
    /// Without an explicit size the range is split in about four groups per
    /// compute unit. The last group may be partial.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::InvalidWorkSize`] if the global size is zero, or the
    /// local size is zero or larger than `max_local`.
    pub fn resolve_local(&self, compute_units: usize, max_local: usize) -> Result<usize, ComputeError> {
        let invalid = ComputeError::InvalidWorkSize {
            global: self.global,
            local: self.local,
        };

        if self.global == 0 {
            return Err(invalid);
        }

        match self.local {
            Some(local) if local == 0 || local > max_local => Err(invalid),
            Some(local) => Ok(local),
            None => Ok(self
                .global
                .div_ceil(compute_units.max(1) * 4)
                .clamp(1, max_local)),
        }
    }
}

/// The view a kernel body has of one work-group.
pub struct WorkGroup<'a> {
    group_id: usize,
    items: Range<usize>,
    global_size: usize,
    args: &'a [KernelArg],
}

impl<'a> WorkGroup<'a> {
    /// Create the view of a work-group.
    pub fn new(
        group_id: usize,
        items: Range<usize>,
        global_size: usize,
        args: &'a [KernelArg],
    ) -> Self {
        Self {
            group_id,
            items,
            global_size,
            args,
        }
    }

    /// Index of the work-group in the dispatch.
    #[inline]
    pub fn group_id(&self) -> usize {
        self.group_id
    }

    /// Global ids of the work-items of this group.
    #[inline]
    pub fn global_ids(&self) -> Range<usize> {
        self.items.clone()
    }

    /// Total number of work-items in the dispatch.
    #[inline]
    pub fn global_size(&self) -> usize {
        self.global_size
    }

    /// The `u8` buffer bound at `index`.
    pub fn u8_buffer(&self, index: usize) -> Result<&'a [AtomicU8], KernelFault> {
        match self.args.get(index) {
            Some(KernelArg::Buffer {
                memory: BufferMemory::U8(memory),
                ..
            }) => Ok(memory),
            _ => Err(KernelFault::BufferArgument(index, ElementKind::U8)),
        }
    }

    /// The `u32` buffer bound at `index`.
    pub fn u32_buffer(&self, index: usize) -> Result<&'a [AtomicU32], KernelFault> {
        match self.args.get(index) {
            Some(KernelArg::Buffer {
                memory: BufferMemory::U32(memory),
                ..
            }) => Ok(memory),
            _ => Err(KernelFault::BufferArgument(index, ElementKind::U32)),
        }
    }

    /// The scalar bound at `index`.
    pub fn scalar(&self, index: usize) -> Result<u32, KernelFault> {
        match self.args.get(index) {
            Some(KernelArg::Scalar(value)) => Ok(*value),
            _ => Err(KernelFault::ScalarArgument(index)),
        }
    }
}

/// Element `index` of a buffer argument, or an out-of-bounds fault.
#[inline]
pub fn cell<T>(buffer: &[T], arg: usize, index: usize) -> Result<&T, KernelFault> {
    buffer.get(index).ok_or(KernelFault::OutOfBounds {
        arg,
        index,
        len: buffer.len(),
    })
}

/// Check bound arguments against a kernel signature.
///
/// # Errors
///
/// Returns an error if the argument count differs, an argument has the wrong
/// kind, or a read-only buffer is bound to a parameter the kernel writes.
pub fn validate_args(def: &KernelDef, args: &[KernelArg]) -> Result<(), ComputeError> {
    if def.params.len() != args.len() {
        return Err(ComputeError::ArgumentCount {
            kernel: def.name.to_string(),
            expected: def.params.len(),
            actual: args.len(),
        });
    }

    for (index, (param, arg)) in def.params.iter().zip(args).enumerate() {
        match (param, arg) {
            (ParamKind::Scalar, KernelArg::Scalar(_)) => {}
            (ParamKind::Buffer { kind, access }, KernelArg::Buffer { memory, access: bound }) => {
                if memory.kind() != *kind {
                    return Err(ComputeError::ArgumentKind {
                        kernel: def.name.to_string(),
                        index,
                    });
                }
                if access.is_writable() && !bound.is_writable() {
                    return Err(ComputeError::AccessViolation {
                        kernel: def.name.to_string(),
                        index,
                    });
                }
            }
            _ => {
                return Err(ComputeError::ArgumentKind {
                    kernel: def.name.to_string(),
                    index,
                })
            }
        }
    }

    Ok(())
}

/// Outcome of a program build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    /// The program built.
    Success,
    /// The program failed to build.
    Error,
}

/// Diagnostics of a program build: status, options and log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLog {
    /// outcome of the build
    pub status: BuildStatus,
    /// options the build was invoked with
    pub options: String,
    /// warnings and errors, one per line
    pub log: String,
}

impl fmt::Display for BuildLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Build Status: {:?}", self.status)?;
        writeln!(f, "Build Options:\t{}", self.options)?;
        write!(f, "Build Log:\t {}", self.log)
    }
}

/// The kernels a program is built from.
#[derive(Debug, Clone, Default)]
pub struct ProgramSource {
    kernels: Vec<KernelDef>,
}

impl ProgramSource {
    /// An empty program source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a kernel to the source.
    pub fn with_kernel(mut self, def: KernelDef) -> Self {
        self.kernels.push(def);
        self
    }

    /// The kernels of the source.
    pub fn kernels(&self) -> &[KernelDef] {
        &self.kernels
    }

    /// Build the source into a program.
    ///
    /// Recognised options are `-Werror` (warnings fail the build) and `-w`
    /// (warnings are dropped).
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::BuildFailed`] with the full build log if the
    /// source is empty, a kernel name is not an identifier or is defined twice,
    /// or an option is not recognised.
    pub fn build(&self, options: &str) -> Result<Program, ComputeError> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let mut werror = false;
        let mut quiet = false;
        for option in options.split_whitespace() {
            match option {
                "-Werror" => werror = true,
                "-w" => quiet = true,
                other => errors.push(format!("error: unrecognized build option '{other}'")),
            }
        }

        if self.kernels.is_empty() {
            errors.push("error: program defines no kernels".to_string());
        }

        let mut kernels = HashMap::new();
        for def in &self.kernels {
            if !is_identifier(def.name) {
                errors.push(format!("error: '{}' is not a valid kernel name", def.name));
                continue;
            }
            if def.params.is_empty() {
                warnings.push(format!("warning: kernel '{}' takes no arguments", def.name));
            }
            if kernels.insert(def.name, *def).is_some() {
                errors.push(format!("error: redefinition of kernel '{}'", def.name));
            }
        }

        if quiet {
            warnings.clear();
        }
        if werror && !warnings.is_empty() {
            errors.push("error: warnings treated as errors".to_string());
        }

        let mut lines = warnings;
        lines.extend(errors.iter().cloned());

        let log = BuildLog {
            status: if errors.is_empty() {
                BuildStatus::Success
            } else {
                BuildStatus::Error
            },
            options: options.to_string(),
            log: lines.join("\n"),
        };

        if !errors.is_empty() {
            return Err(ComputeError::BuildFailed(log));
        }

        Ok(Program {
            kernels,
            build_log: log,
        })
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A built program; kernels are looked up by name.
#[derive(Debug, Clone)]
pub struct Program {
    kernels: HashMap<&'static str, KernelDef>,
    build_log: BuildLog,
}

impl Program {
    /// Look up a kernel by its name.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::KernelNotFound`] if the program has no such kernel.
    pub fn kernel(&self, name: &str) -> Result<Kernel, ComputeError> {
        self.kernels
            .get(name)
            .map(|def| Kernel { def: *def })
            .ok_or_else(|| ComputeError::KernelNotFound(name.to_string()))
    }

    /// The log of the build that produced this program.
    pub fn build_log(&self) -> &BuildLog {
        &self.build_log
    }
}

/// A kernel looked up from a [`Program`].
#[derive(Debug, Clone, Copy)]
pub struct Kernel {
    def: KernelDef,
}

impl Kernel {
    /// The kernel name.
    pub fn name(&self) -> &'static str {
        self.def.name
    }

    /// The kernel definition.
    pub fn def(&self) -> &KernelDef {
        &self.def
    }
}
