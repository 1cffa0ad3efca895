use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use histeq_compute::{
    AccessMode, Buffer, BuildLog, BuildStatus, ComputeBackend, ComputeError, CpuBackend,
    DeviceElement, DeviceInfo, Event, Kernel, KernelArg, NdRange, Program, ProgramSource,
};
use histeq_image::{Image, ImageSize};
use histeq_imgproc::{EqualizeConfig, Equalizer, PipelineError, ScanStrategy, Stage};

/// Delegates to the host backend, injecting failures on request.
struct ProbeBackend {
    inner: CpuBackend,
    reject_build: bool,
    fail_kernel: Option<&'static str>,
    cancel_after: Option<(&'static str, Arc<AtomicBool>)>,
    dispatched: std::sync::Mutex<Vec<String>>,
}

impl ProbeBackend {
    fn new() -> Result<Self, ComputeError> {
        Ok(Self {
            inner: CpuBackend::default_device()?,
            reject_build: false,
            fail_kernel: None,
            cancel_after: None,
            dispatched: Default::default(),
        })
    }

    fn dispatched(&self) -> Vec<String> {
        self.dispatched.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

impl ComputeBackend for ProbeBackend {
    fn device(&self) -> &DeviceInfo {
        self.inner.device()
    }

    fn build_program(&self, source: &ProgramSource, options: &str) -> Result<Program, ComputeError> {
        if self.reject_build {
            return Err(ComputeError::BuildFailed(BuildLog {
                status: BuildStatus::Error,
                options: options.to_string(),
                log: "error: device out of resources".to_string(),
            }));
        }
        self.inner.build_program(source, options)
    }

    fn create_buffer<T: DeviceElement>(
        &self,
        access: AccessMode,
        len: usize,
    ) -> Result<Buffer<T>, ComputeError> {
        self.inner.create_buffer(access, len)
    }

    fn write_buffer<T: DeviceElement>(
        &self,
        buffer: &Buffer<T>,
        data: &[T],
    ) -> Result<(), ComputeError> {
        self.inner.write_buffer(buffer, data)
    }

    fn fill_buffer<T: DeviceElement>(
        &self,
        buffer: &Buffer<T>,
        value: T,
    ) -> Result<(), ComputeError> {
        self.inner.fill_buffer(buffer, value)
    }

    fn read_buffer<T: DeviceElement>(&self, buffer: &Buffer<T>) -> Result<Vec<T>, ComputeError> {
        self.inner.read_buffer(buffer)
    }

    fn enqueue_kernel(
        &self,
        kernel: &Kernel,
        args: &[KernelArg],
        range: NdRange,
    ) -> Result<Event, ComputeError> {
        if self.fail_kernel == Some(kernel.name()) {
            return Err(ComputeError::Device(format!("{} lost", kernel.name())));
        }

        let event = self.inner.enqueue_kernel(kernel, args, range)?;

        if let Ok(mut dispatched) = self.dispatched.lock() {
            dispatched.push(kernel.name().to_string());
        }
        if let Some((name, flag)) = &self.cancel_after {
            if *name == kernel.name() {
                flag.store(true, Ordering::Relaxed);
            }
        }

        Ok(event)
    }

    fn finish(&self) -> Result<(), ComputeError> {
        self.inner.finish()
    }
}

fn image() -> Result<Image<u8, 1>, PipelineError> {
    let data = (0..64u8).map(|i| i * 2 + 30).collect();
    Ok(Image::new(ImageSize { width: 8, height: 8 }, data)?)
}

#[test]
fn stage_failure_aborts_the_run() -> Result<(), Box<dyn std::error::Error>> {
    let cases = [
        ("hist_atomic", Stage::Histogram, 0),
        ("scan_hs_step", Stage::Scan, 1),
        ("lut_normalize", Stage::Normalize, 9),
        ("remap", Stage::Remap, 10),
    ];

    for (kernel, stage, dispatches_before) in cases {
        let mut backend = ProbeBackend::new()?;
        backend.fail_kernel = Some(kernel);

        let res = Equalizer::new(&backend, EqualizeConfig::default())?.equalize(&image()?);

        match res {
            Err(PipelineError::StageFailed {
                stage: failed,
                source: ComputeError::Device(msg),
            }) => {
                assert_eq!(failed, stage);
                assert_eq!(msg, format!("{kernel} lost"));
            }
            other => panic!("expected {stage} to fail, got {other:?}"),
        }

        // nothing ran after the failing stage
        assert_eq!(backend.dispatched().len(), dispatches_before, "{kernel}");
    }
    Ok(())
}

#[test]
fn serial_scan_failure() -> Result<(), Box<dyn std::error::Error>> {
    let mut backend = ProbeBackend::new()?;
    backend.fail_kernel = Some("scan_serial");

    let config = EqualizeConfig::default().with_scan(ScanStrategy::Serial);
    let res = Equalizer::new(&backend, config)?.equalize(&image()?);

    assert!(matches!(
        res,
        Err(PipelineError::StageFailed {
            stage: Stage::Scan,
            ..
        })
    ));
    assert_eq!(backend.dispatched(), vec!["hist_atomic".to_string()]);
    Ok(())
}

#[test]
fn build_failure_keeps_the_log() -> Result<(), Box<dyn std::error::Error>> {
    let mut backend = ProbeBackend::new()?;
    backend.reject_build = true;

    match Equalizer::new(&backend, EqualizeConfig::default()) {
        Err(PipelineError::Build(ComputeError::BuildFailed(log))) => {
            assert_eq!(log.status, BuildStatus::Error);
            assert_eq!(log.options, "-Werror");
            assert_eq!(log.log, "error: device out of resources");
        }
        Err(other) => panic!("expected a build failure, got {other:?}"),
        Ok(_) => panic!("expected a build failure"),
    }
    Ok(())
}

#[test]
fn cancelled_between_stages() -> Result<(), Box<dyn std::error::Error>> {
    let flag = Arc::new(AtomicBool::new(false));

    let mut backend = ProbeBackend::new()?;
    backend.cancel_after = Some(("lut_normalize", flag.clone()));

    let equalizer =
        Equalizer::new(&backend, EqualizeConfig::default())?.with_cancel_flag(flag.clone());
    let res = equalizer.equalize(&image()?);

    assert!(matches!(res, Err(PipelineError::Cancelled(Stage::Remap))));
    assert!(!backend.dispatched().contains(&"remap".to_string()));
    Ok(())
}
