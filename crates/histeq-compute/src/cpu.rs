use std::time::Instant;

use rayon::prelude::*;

use crate::backend::ComputeBackend;
use crate::buffer::{AccessMode, Buffer, DeviceElement};
use crate::device::{self, DeviceInfo};
use crate::error::ComputeError;
use crate::event::Event;
use crate::kernel::{self, Kernel, KernelArg, NdRange, Program, ProgramSource, WorkGroup};

/// A compute device running kernels on the host.
///
/// Every device owns a rayon thread pool sized by its compute units. Work-groups
/// of a dispatch are spread over the pool; the dispatch has retired when
/// [`ComputeBackend::enqueue_kernel`] returns, so the queue is in-order and
/// blocking.
pub struct CpuBackend {
    info: DeviceInfo,
    pool: rayon::ThreadPool,
    epoch: Instant,
}

impl CpuBackend {
    /// Open a device by platform and device index.
    ///
    /// # Errors
    ///
    /// Returns an error if the indices do not name a device or its thread pool
    /// cannot be built.
    ///
    /// # Example
    ///
    /// ```
    /// use histeq_compute::{ComputeBackend, CpuBackend, DeviceKind};
    ///
    /// let backend = CpuBackend::new(0, 1).unwrap();
    /// assert_eq!(backend.device().kind, DeviceKind::Serial);
    /// ```
    pub fn new(platform_id: usize, device_id: usize) -> Result<Self, ComputeError> {
        let info = device::device_info(platform_id, device_id)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(info.compute_units)
            .thread_name(move |i| format!("histeq-p{platform_id}d{device_id}-{i}"))
            .build()
            .map_err(|e| ComputeError::ThreadPool(e.to_string()))?;

        log::debug!(
            "opened device {} ({} compute units)",
            info.name,
            info.compute_units
        );

        Ok(Self {
            info,
            pool,
            epoch: Instant::now(),
        })
    }

    /// Open the first device of the first platform.
    pub fn default_device() -> Result<Self, ComputeError> {
        Self::new(0, 0)
    }

    fn now_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }
}

fn check_len(expected: usize, actual: usize) -> Result<(), ComputeError> {
    if expected != actual {
        return Err(ComputeError::BufferLengthMismatch { expected, actual });
    }
    Ok(())
}

impl ComputeBackend for CpuBackend {
    fn device(&self) -> &DeviceInfo {
        &self.info
    }

    fn build_program(&self, source: &ProgramSource, options: &str) -> Result<Program, ComputeError> {
        let program = source.build(options)?;
        if !program.build_log().log.is_empty() {
            log::warn!("program built with diagnostics:\n{}", program.build_log());
        }
        Ok(program)
    }

    fn create_buffer<T: DeviceElement>(
        &self,
        access: AccessMode,
        len: usize,
    ) -> Result<Buffer<T>, ComputeError> {
        Buffer::zeroed(access, len)
    }

    fn write_buffer<T: DeviceElement>(
        &self,
        buffer: &Buffer<T>,
        data: &[T],
    ) -> Result<(), ComputeError> {
        check_len(buffer.len(), data.len())?;
        self.pool.install(|| {
            buffer
                .cells()
                .par_iter()
                .zip(data.par_iter())
                .for_each(|(cell, &value)| T::store(cell, value));
        });
        Ok(())
    }

    fn fill_buffer<T: DeviceElement>(
        &self,
        buffer: &Buffer<T>,
        value: T,
    ) -> Result<(), ComputeError> {
        self.pool.install(|| {
            buffer
                .cells()
                .par_iter()
                .for_each(|cell| T::store(cell, value));
        });
        Ok(())
    }

    fn read_buffer<T: DeviceElement>(&self, buffer: &Buffer<T>) -> Result<Vec<T>, ComputeError> {
        Ok(self
            .pool
            .install(|| buffer.cells().par_iter().map(T::load).collect()))
    }

    fn enqueue_kernel(
        &self,
        kernel: &Kernel,
        args: &[KernelArg],
        range: NdRange,
    ) -> Result<Event, ComputeError> {
        let queued = self.now_ns();

        let def = kernel.def();
        kernel::validate_args(def, args)?;
        let local = range.resolve_local(self.info.compute_units, self.info.max_work_group_size)?;
        let global = range.global;
        let num_groups = global.div_ceil(local);
        let body = def.body;

        let submitted = self.now_ns();
        let start = self.now_ns();

        self.pool
            .install(|| {
                (0..num_groups).into_par_iter().try_for_each(|group_id| {
                    let first = group_id * local;
                    let last = (first + local).min(global);
                    body(&WorkGroup::new(group_id, first..last, global, args))
                })
            })
            .map_err(|fault| ComputeError::KernelFault {
                kernel: def.name.to_string(),
                fault,
            })?;

        let end = self.now_ns();

        log::trace!(
            "{}: {} work-items in {} groups of {} ({} ns)",
            def.name,
            global,
            num_groups,
            local,
            end - start
        );

        Ok(Event {
            kernel: def.name.to_string(),
            global_size: global,
            queued,
            submitted,
            start,
            end,
        })
    }

    fn finish(&self) -> Result<(), ComputeError> {
        // dispatches and transfers retire before they return
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::buffer::ElementKind;
    use crate::error::KernelFault;
    use crate::kernel::{cell, KernelDef, ParamKind};

    fn double(group: &WorkGroup<'_>) -> Result<(), KernelFault> {
        let src = group.u8_buffer(0)?;
        let dst = group.u32_buffer(1)?;
        for gid in group.global_ids() {
            let value = cell(src, 0, gid)?.load(Ordering::Relaxed) as u32;
            cell(dst, 1, gid)?.store(value * 2, Ordering::Relaxed);
        }
        Ok(())
    }

    fn count_groups(group: &WorkGroup<'_>) -> Result<(), KernelFault> {
        let counter = group.u32_buffer(0)?;
        cell(counter, 0, 0)?.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    const DOUBLE: KernelDef = KernelDef {
        name: "double",
        params: &[
            ParamKind::Buffer {
                kind: ElementKind::U8,
                access: AccessMode::ReadOnly,
            },
            ParamKind::Buffer {
                kind: ElementKind::U32,
                access: AccessMode::WriteOnly,
            },
        ],
        body: double,
    };

    const COUNT_GROUPS: KernelDef = KernelDef {
        name: "count_groups",
        params: &[ParamKind::Buffer {
            kind: ElementKind::U32,
            access: AccessMode::ReadWrite,
        }],
        body: count_groups,
    };

    fn program(backend: &CpuBackend) -> Result<Program, ComputeError> {
        let source = ProgramSource::new()
            .with_kernel(DOUBLE)
            .with_kernel(COUNT_GROUPS);
        backend.build_program(&source, "")
    }

    #[test]
    fn dispatch_on_every_device() -> Result<(), ComputeError> {
        for device_id in 0..2 {
            let backend = CpuBackend::new(0, device_id)?;
            let program = program(&backend)?;

            let src = backend.create_buffer::<u8>(AccessMode::ReadOnly, 5)?;
            let dst = backend.create_buffer::<u32>(AccessMode::WriteOnly, 5)?;
            backend.write_buffer(&src, &[1, 2, 3, 4, 255])?;

            let event = backend.enqueue_kernel(
                &program.kernel("double")?,
                &[(&src).into(), (&dst).into()],
                NdRange::new(5).with_local(2),
            )?;
            backend.finish()?;

            assert_eq!(backend.read_buffer(&dst)?, vec![2, 4, 6, 8, 510]);
            assert_eq!(event.kernel, "double");
            assert_eq!(event.global_size, 5);
            assert!(event.queued <= event.start && event.start <= event.end);
        }
        Ok(())
    }

    #[test]
    fn partial_last_group() -> Result<(), ComputeError> {
        let backend = CpuBackend::default_device()?;
        let program = program(&backend)?;
        let counter = backend.create_buffer::<u32>(AccessMode::ReadWrite, 1)?;

        backend.enqueue_kernel(
            &program.kernel("count_groups")?,
            &[(&counter).into()],
            NdRange::new(10).with_local(4),
        )?;

        assert_eq!(backend.read_buffer(&counter)?, vec![3]);
        Ok(())
    }

    #[test]
    fn kernel_fault_is_reported() -> Result<(), ComputeError> {
        let backend = CpuBackend::default_device()?;
        let program = program(&backend)?;
        let src = backend.create_buffer::<u8>(AccessMode::ReadOnly, 2)?;
        let dst = backend.create_buffer::<u32>(AccessMode::WriteOnly, 2)?;

        let res = backend.enqueue_kernel(
            &program.kernel("double")?,
            &[(&src).into(), (&dst).into()],
            NdRange::new(3),
        );

        assert!(matches!(
            res,
            Err(ComputeError::KernelFault {
                fault: KernelFault::OutOfBounds { index: 2, .. },
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn transfers() -> Result<(), ComputeError> {
        let backend = CpuBackend::default_device()?;
        let buffer = backend.create_buffer::<u32>(AccessMode::ReadWrite, 3)?;

        backend.fill_buffer(&buffer, 7)?;
        assert_eq!(backend.read_buffer(&buffer)?, vec![7, 7, 7]);

        assert!(matches!(
            backend.write_buffer(&buffer, &[1, 2]),
            Err(ComputeError::BufferLengthMismatch {
                expected: 3,
                actual: 2
            })
        ));
        Ok(())
    }

    #[test]
    fn invalid_dispatch() -> Result<(), ComputeError> {
        let backend = CpuBackend::default_device()?;
        let program = program(&backend)?;
        let src = backend.create_buffer::<u8>(AccessMode::ReadOnly, 2)?;
        let dst = backend.create_buffer::<u32>(AccessMode::WriteOnly, 2)?;

        assert!(matches!(
            backend.enqueue_kernel(
                &program.kernel("double")?,
                &[(&src).into(), (&dst).into()],
                NdRange::new(0),
            ),
            Err(ComputeError::InvalidWorkSize { global: 0, .. })
        ));
        Ok(())
    }

    #[test]
    fn invalid_device() {
        assert!(matches!(
            CpuBackend::new(0, 9),
            Err(ComputeError::InvalidDevice { device_id: 9, .. })
        ));
    }
}
