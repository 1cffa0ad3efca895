use histeq_compute::{ComputeBackend, CpuBackend};
use histeq_image::{Image, ImageSize};
use histeq_imgproc::{
    equalize, EqualizeConfig, Equalized, Equalizer, HistogramStrategy, PipelineError,
    ScanStrategy,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn backend() -> Result<CpuBackend, PipelineError> {
    CpuBackend::default_device().map_err(PipelineError::Build)
}

fn random_image(width: usize, height: usize, seed: u64) -> Result<Image<u8, 1>, PipelineError> {
    let mut rng = StdRng::seed_from_u64(seed);
    // a narrow band of intensities, so equalization has something to stretch
    let data = (0..width * height)
        .map(|_| rng.random_range(60..=140u8))
        .collect();
    Ok(Image::new(ImageSize { width, height }, data)?)
}

fn assert_invariants(image: &Image<u8, 1>, out: &Equalized, bins: usize) {
    let num_pixels = image.numel() as u32;

    assert_eq!(out.histogram.len(), bins);
    assert_eq!(out.histogram.iter().sum::<u32>(), num_pixels);

    assert_eq!(out.cumulative.len(), bins);
    assert!(out.cumulative.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(out.cumulative.last().copied(), Some(num_pixels));

    assert_eq!(out.lut.len(), 256);
    assert!(out.lut.windows(2).all(|w| w[0] <= w[1]));

    assert_eq!(out.image.size(), image.size());
    assert_eq!(out.image.num_channels(), 1);
    for (px, out_px) in image.as_slice().iter().zip(out.image.as_slice()) {
        assert_eq!(*out_px, out.lut[*px as usize]);
    }
}

#[test]
fn random_image_invariants() -> Result<(), PipelineError> {
    let _ = env_logger::builder().is_test(true).try_init();

    let backend = backend()?;
    let image = random_image(97, 61, 7)?;

    for bins in [1, 2, 16, 100, 255, 256] {
        let out = equalize(&backend, &image, bins)?;
        assert_invariants(&image, &out, bins);
    }
    Ok(())
}

#[test]
fn equalization_stretches_the_range() -> Result<(), PipelineError> {
    let backend = backend()?;
    let image = random_image(64, 64, 11)?;

    let out = equalize(&backend, &image, 256)?;

    let min = out.image.as_slice().iter().min().copied();
    let max = out.image.as_slice().iter().max().copied();
    assert_eq!(min, Some(0));
    assert_eq!(max, Some(255));
    Ok(())
}

#[test]
fn two_level_image() -> Result<(), PipelineError> {
    let backend = backend()?;
    let image = Image::new(ImageSize { width: 2, height: 2 }, vec![0, 0, 255, 255])?;

    let out = equalize(&backend, &image, 256)?;

    let mut histogram = vec![0u32; 256];
    histogram[0] = 2;
    histogram[255] = 2;
    assert_eq!(out.histogram, histogram);
    assert_eq!(out.cumulative[0], 2);
    assert!(out.cumulative[1..255].iter().all(|&c| c == 2));
    assert_eq!(out.cumulative[255], 4);
    assert_eq!(out.lut[0], 0);
    assert_eq!(out.lut[255], 255);
    assert_eq!(out.image.as_slice(), &[0, 0, 255, 255]);
    Ok(())
}

#[test]
fn uniform_histogram_gives_identity() -> Result<(), PipelineError> {
    let backend = backend()?;
    let data = (0..=255u8).collect::<Vec<_>>();
    let image = Image::new(ImageSize { width: 16, height: 16 }, data.clone())?;

    let out = equalize(&backend, &image, 256)?;

    assert!(out.histogram.iter().all(|&c| c == 1));
    assert_eq!(out.lut, data);
    assert_eq!(out.image.as_slice(), image.as_slice());
    Ok(())
}

#[test]
fn constant_image_is_unchanged() -> Result<(), PipelineError> {
    let backend = backend()?;

    for value in [0u8, 77, 255] {
        let image = Image::from_size_val(ImageSize { width: 5, height: 3 }, value)?;
        let out = equalize(&backend, &image, 256)?;

        assert_eq!(out.histogram[value as usize], 15);
        assert_eq!(out.lut, (0..=255u8).collect::<Vec<_>>());
        assert_eq!(out.image.as_slice(), image.as_slice());
    }
    Ok(())
}

#[test]
fn single_pixel() -> Result<(), PipelineError> {
    let backend = backend()?;
    let image = Image::new(ImageSize { width: 1, height: 1 }, vec![42])?;

    let out = equalize(&backend, &image, 256)?;
    assert_eq!(out.image.as_slice(), &[42]);
    Ok(())
}

#[test]
fn fewer_bins_quantize_the_output() -> Result<(), PipelineError> {
    let backend = backend()?;
    let data = (0..1024u32).map(|i| (i % 256) as u8).collect::<Vec<_>>();
    let image = Image::new(ImageSize { width: 32, height: 32 }, data)?;

    let out = equalize(&backend, &image, 4)?;

    assert_eq!(out.histogram, vec![256; 4]);
    assert_eq!(out.cumulative, vec![256, 512, 768, 1024]);

    let mut levels = out.image.as_slice().to_vec();
    levels.sort_unstable();
    levels.dedup();
    assert_eq!(levels, vec![0, 85, 170, 255]);
    Ok(())
}

fn distinct_levels(image: &Image<u8, 1>) -> usize {
    let mut levels = image.as_slice().to_vec();
    levels.sort_unstable();
    levels.dedup();
    levels.len()
}

#[test]
fn single_occupied_bin_keeps_bin_count() -> Result<(), PipelineError> {
    let backend = backend()?;

    let image = random_image(20, 10, 3)?;
    let out = equalize(&backend, &image, 1)?;
    assert_eq!(out.histogram, vec![200]);
    assert!(out.image.as_slice().iter().all(|&px| px == 0));

    // every intensity of 64..=127 falls in bin 1 of 4
    let data = (0..256u32).map(|i| 64 + (i % 64) as u8).collect();
    let image = Image::new(ImageSize { width: 16, height: 16 }, data)?;
    let out = equalize(&backend, &image, 4)?;
    assert_eq!(out.histogram, vec![0, 256, 0, 0]);
    assert!(distinct_levels(&out.image) <= 4);
    assert!(out.image.as_slice().iter().all(|&px| px == 64));

    for bins in [2, 16, 100] {
        let out = equalize(&backend, &Image::from_size_val(image.size(), 90)?, bins)?;
        assert_eq!(distinct_levels(&out.image), 1, "bins = {bins}");
    }
    Ok(())
}

#[test]
fn runs_are_deterministic() -> Result<(), PipelineError> {
    let backend = backend()?;
    let image = random_image(128, 96, 5)?;
    let equalizer = Equalizer::new(&backend, EqualizeConfig::new(200))?;

    let first = equalizer.equalize(&image)?;
    let second = equalizer.equalize(&image)?;

    assert_eq!(first.image, second.image);
    assert_eq!(first.histogram, second.histogram);
    assert_eq!(first.cumulative, second.cumulative);
    assert_eq!(first.lut, second.lut);
    Ok(())
}

#[test]
fn strategies_and_devices_agree() -> Result<(), PipelineError> {
    let image = random_image(173, 59, 13)?;

    let parallel = backend()?;
    let reference = equalize(&parallel, &image, 256)?;

    let serial = CpuBackend::new(0, 1).map_err(PipelineError::Build)?;

    for backend in [&parallel, &serial] {
        for histogram in [
            HistogramStrategy::Atomic,
            HistogramStrategy::Local { group_size: 1 },
            HistogramStrategy::Local { group_size: 500 },
            HistogramStrategy::Local { group_size: 1 << 16 },
        ] {
            for scan in [ScanStrategy::HillisSteele, ScanStrategy::Serial] {
                let config = EqualizeConfig::default()
                    .with_histogram(histogram)
                    .with_scan(scan);
                let out = Equalizer::new(backend, config)?.equalize(&image)?;

                assert_eq!(out.histogram, reference.histogram, "{config:?}");
                assert_eq!(out.cumulative, reference.cumulative, "{config:?}");
                assert_eq!(out.lut, reference.lut, "{config:?}");
                assert_eq!(out.image, reference.image, "{config:?}");
            }
        }
    }
    Ok(())
}

#[test]
fn input_is_not_modified() -> Result<(), PipelineError> {
    let backend = backend()?;
    let image = random_image(31, 17, 21)?;
    let copy = image.clone();

    let out = equalize(&backend, &image, 256)?;

    assert_eq!(image, copy);
    assert_ne!(out.image, image);
    Ok(())
}

#[test]
fn rejected_inputs() -> Result<(), PipelineError> {
    let backend = backend()?;
    let image = random_image(4, 4, 1)?;

    assert!(matches!(
        equalize(&backend, &image, 257),
        Err(PipelineError::InvalidBinCount(257))
    ));
    assert!(matches!(
        Equalizer::new(
            &backend,
            EqualizeConfig::default().with_histogram(HistogramStrategy::Local { group_size: 0 })
        ),
        Err(PipelineError::InvalidGroupSize(0))
    ));

    // larger than any work-group the device runs, rejected before any stage
    let oversized = backend.device().max_work_group_size + 1;
    assert!(matches!(
        Equalizer::new(
            &backend,
            EqualizeConfig::default()
                .with_histogram(HistogramStrategy::Local { group_size: oversized })
        ),
        Err(PipelineError::InvalidGroupSize(size)) if size == oversized
    ));
    assert!(matches!(
        Equalizer::new(
            &backend,
            EqualizeConfig::default()
                .with_histogram(HistogramStrategy::Local { group_size: 1 << 17 })
        ),
        Err(PipelineError::InvalidGroupSize(131_072))
    ));

    let empty = Image::new(ImageSize { width: 3, height: 0 }, vec![])?;
    assert!(matches!(
        equalize(&backend, &empty, 256),
        Err(PipelineError::EmptyImage(_))
    ));
    Ok(())
}
