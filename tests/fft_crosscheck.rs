use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use timbre_dsp::dsp::fft::Fft;

fn signal(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| {
            let t = i as f32 / n as f32;
            (t * 2.0 * std::f32::consts::PI * 5.0).sin() * 0.5
                + (t * 2.0 * std::f32::consts::PI * 23.0).cos() * 0.25
                + if i % 17 == 0 { 0.1 } else { 0.0 }
        })
        .collect()
}

#[test]
fn forward_matches_rustfft() {
    let mut planner = FftPlanner::<f32>::new();
    for n in [16, 256, 1024] {
        let input = signal(n);
        let mut reference: Vec<Complex<f32>> = input.iter().map(|&x| Complex::new(x, 0.0)).collect();
        planner.plan_fft_forward(n).process(&mut reference);

        let mut fft = Fft::new(n);
        let (re, im) = fft.forward(&input);
        let tolerance = 1e-3 * n as f32;
        for k in 0..n {
            assert!((re[k] - reference[k].re).abs() < tolerance, "n {n} bin {k} real");
            assert!((im[k] - reference[k].im).abs() < tolerance, "n {n} bin {k} imag");
        }
    }
}

#[test]
fn inverse_matches_rustfft() {
    let n = 512;
    let mut planner = FftPlanner::<f32>::new();
    let mut spectrum: Vec<Complex<f32>> = signal(n).iter().map(|&x| Complex::new(x, 0.0)).collect();
    planner.plan_fft_forward(n).process(&mut spectrum);

    let re: Vec<f32> = spectrum.iter().map(|c| c.re).collect();
    let im: Vec<f32> = spectrum.iter().map(|c| c.im).collect();

    let mut reference = spectrum.clone();
    planner.plan_fft_inverse(n).process(&mut reference);

    let mut fft = Fft::new(n);
    let out = fft.inverse(&re, &im);
    for (i, (a, b)) in out.iter().zip(&reference).enumerate() {
        // rustfft leaves the 1/n to the caller
        let expected = b.re / n as f32;
        assert!((a - expected).abs() < 1e-4, "sample {i}: {a} vs {expected}");
    }
}

#[test]
fn spectrum_peak_bin_agrees() {
    let n = 1024;
    let bin = 41;
    let input: Vec<f32> = (0..n)
        .map(|i| (2.0 * std::f32::consts::PI * bin as f32 * i as f32 / n as f32).sin())
        .collect();

    let mut reference: Vec<Complex<f32>> = input.iter().map(|&x| Complex::new(x, 0.0)).collect();
    FftPlanner::<f32>::new().plan_fft_forward(n).process(&mut reference);
    let loudest_reference = reference[..n / 2]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
        .map(|(i, _)| i);

    let mut fft = Fft::new(n);
    fft.forward(&input);
    let loudest = fft
        .spectrum()
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i);

    assert_eq!(loudest, Some(bin));
    assert_eq!(loudest, loudest_reference);
}
