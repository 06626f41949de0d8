use std::{mem::size_of, sync::mpsc, time::Instant};

use log::debug;

use crate::{
    backend::{validate_request, Backend, BackendKind},
    cancel::CancelToken,
    config::{FractalConfiguration, OutputMode},
    error::EngineError,
    escape::{allocate, EscapeImage},
    gpu::{
        cache::KernelCache,
        command_encoder::{self, CommandEncoderExt},
        compute::fractal_dispatch_size,
        context::GpuContext,
        typed_buffer::{self, Buffer},
    },
    screen,
    shader::{self, KernelKey, KernelParams, ENTRY_POINT},
    viewport::Viewport,
};

/// A compiled kernel and the layout its bind groups are created against.
pub struct CompiledKernel {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl CompiledKernel {
    fn compile(context: &GpuContext, key: KernelKey) -> Result<Self, EngineError> {
        let source = shader::generate_checked(key)?;
        let device = &context.device;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("fractal-kernel"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let storage_entry = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("fractal-bind-group-layout"),
            entries: &[storage_entry(0, true), storage_entry(1, false)],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("fractal-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("fractal-pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: ENTRY_POINT,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(EngineError::KernelCompile {
                variant: key.variant,
                mode: key.mode,
                message: error.to_string(),
            });
        }

        Ok(Self {
            pipeline,
            bind_group_layout,
        })
    }
}

/// Runs generated kernels on one device, one work-item per pixel.
pub struct GpuEngine {
    context: GpuContext,
    kernels: KernelCache<CompiledKernel>,
}

impl GpuEngine {
    pub fn new() -> Result<Self, EngineError> {
        Ok(Self::with_context(GpuContext::init()?))
    }

    pub fn with_context(context: GpuContext) -> Self {
        Self {
            context,
            kernels: KernelCache::new(),
        }
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// How many kernels have been compiled so far.
    pub fn compile_count(&self) -> usize {
        self.kernels.compile_count()
    }

    pub fn compute(
        &mut self,
        config: &FractalConfiguration,
        viewport: &Viewport,
        size: screen::Size,
        cancel: &CancelToken,
    ) -> Result<EscapeImage, EngineError> {
        validate_request(config, viewport, size)?;
        let start = Instant::now();

        let key = KernelKey::from(config);
        let context = &self.context;
        let kernel = self
            .kernels
            .get_or_compile(key, |key| CompiledKernel::compile(context, key))?;

        let params = KernelParams::new(config, viewport, size);
        let values = match key.mode {
            // WGSL only has 32-bit atomics, so a GPU hit counter wraps after
            // `u32::MAX` hits on one pixel. The CPU engine counts in `u64`.
            OutputMode::Buddha =>run::<u32>(context, kernel, &params, size, cancel)?
                .into_iter()
                .map(f64::from)
                .collect(),
            _ => run::<f64>(context, kernel, &params, size, cancel)?,
        };

        debug!(
            "GPU {} / {} {}x{} took {:?}",
            key.variant,
            key.mode,
            size.width,
            size.height,
            start.elapsed()
        );

        Ok(EscapeImage {
            values,
            size,
            iteration_cap: config.iteration_cap(),
        })
    }
}

impl Backend for GpuEngine {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn compute(
        &mut self,
        config: &FractalConfiguration,
        viewport: &Viewport,
        size: screen::Size,
        cancel: &CancelToken,
    ) -> Result<EscapeImage, EngineError> {
        GpuEngine::compute(self, config, viewport, size, cancel)
    }
}

/// Dispatches `kernel` over every pixel and reads back one `A` per pixel.
fn run<A: bytemuck::Pod + bytemuck::Zeroable>(
    context: &GpuContext,
    kernel: &CompiledKernel,
    params: &KernelParams,
    size: screen::Size,
    cancel: &CancelToken,
) -> Result<Vec<A>, EngineError> {
    let device = &context.device;
    let allocation_error = || EngineError::Allocation {
        width: size.width,
        height: size.height,
    };
    let pixel_count = size.pixel_count().ok_or_else(allocation_error)?;
    if u32::try_from(pixel_count).is_err() {
        return Err(allocation_error());
    }

    let output_builder = typed_buffer::Builder::<A>::new(pixel_count as u64)
        .with_label("fractal-output")
        .with_usage(wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC);
    if output_builder.byte_size() > context.max_storage_bytes() {
        return Err(allocation_error());
    }
    let mut values = allocate(size, A::zeroed())?;

    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let params_buffer: Buffer<KernelParams> =
        typed_buffer::Builder::from(std::slice::from_ref(params))
            .with_label("fractal-params")
            .with_usage(wgpu::BufferUsages::STORAGE)
            .create(device);
    let output: Buffer<A> = output_builder.create(device);
    let staging: Buffer<A> = typed_buffer::Builder::new(pixel_count as u64)
        .with_label("fractal-staging")
        .with_usage(wgpu::BufferUsages::MAP_READ)
        .create(device);
    if pollster::block_on(device.pop_error_scope()).is_some() {
        return Err(allocation_error());
    }

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("fractal-bind-group"),
        layout: &kernel.bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.binding_resource(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: output.binding_resource(),
            },
        ],
    });

    cancel.check()?;

    let (x, y, z) = fractal_dispatch_size(pixel_count)?;
    let command_buffer = command_encoder::record(device, "fractal-command-encoder", |encoder| {
        encoder.dispatch_kernel("fractal-compute-pass", &kernel.pipeline, &bind_group, (x, y, z));
        typed_buffer::copy_buffer_to_buffer(encoder, &output, &staging);
    });
    context.queue.submit(Some(command_buffer));

    let (sender, receiver) = mpsc::channel();
    let slice = staging.slice();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    receiver
        .recv()
        .map_err(|_| EngineError::BackendUnavailable("device lost during read-back".into()))??;

    {
        let view = slice.get_mapped_range();
        values.copy_from_slice(&view);
    }
    staging.unmap();

    debug!(
        "read back {} bytes of {}-byte values",
        pixel_count * size_of::<A>(),
        size_of::<A>()
    );

    params_buffer.destroy();
    output.destroy();
    staging.destroy();
    Ok(values)
}
