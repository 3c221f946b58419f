use catalog_harmonize::{
    categorize, compute_scaling, Category, Compositor, Dimensions, HarmonizeConfig, LayoutEngine,
    OutputFormat, ProductContext,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgba, RgbaImage};

const CANVAS: Dimensions = Dimensions {
    width: 2000,
    height: 2500,
};

fn bench_layout(c: &mut Criterion) {
    let engine = LayoutEngine::new(CANVAS);
    let context = ProductContext::new("Hand-thrown Ceramic Vase", "Home Decor");

    c.bench_function("categorize", |b| {
        b.iter(|| categorize(black_box(1000), black_box(2400), black_box("Enamel Pin Set"), black_box("Accessories")));
    });

    c.bench_function("compute_scaling_default", |b| {
        b.iter(|| compute_scaling(black_box(1200), black_box(1400), Category::Default, CANVAS));
    });

    c.bench_function("plan_and_shadow", |b| {
        b.iter(|| {
            let info = engine
                .plan(black_box(Dimensions::new(3000, 1200)), &context)
                .unwrap();
            engine.shadow(&info)
        });
    });
}

fn bench_compositing(c: &mut Criterion) {
    let config = HarmonizeConfig::builder()
        .canvas_size(800, 1000)
        .output_format(OutputFormat::Png)
        .build()
        .unwrap();
    let engine = LayoutEngine::new(Dimensions::new(800, 1000));
    let compositor = Compositor::new(&config);
    let foreground = RgbaImage::from_pixel(600, 900, Rgba([120, 80, 40, 255]));
    let info = engine
        .plan(Dimensions::new(600, 900), &ProductContext::new("Lamp", "Lighting"))
        .unwrap();
    let shadow = engine.shadow(&info);

    let mut group = c.benchmark_group("compositing");
    group.sample_size(20);
    group.bench_function("render_800x1000", |b| {
        b.iter(|| compositor.render(black_box(&foreground), &info, &shadow).unwrap());
    });
    group.bench_function("compose_png_800x1000", |b| {
        b.iter(|| compositor.compose(black_box(&foreground), &info, &shadow).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_layout, bench_compositing);
criterion_main!(benches);
