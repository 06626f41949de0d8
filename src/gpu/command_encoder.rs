/// Kernel dispatch recorded straight onto an encoder.
pub trait CommandEncoderExt {
    fn dispatch_kernel(
        &mut self,
        label: &str,
        pipeline: &wgpu::ComputePipeline,
        bind_group: &wgpu::BindGroup,
        workgroups: (u32, u32, u32),
    );
}

impl CommandEncoderExt for wgpu::CommandEncoder {
    fn dispatch_kernel(
        &mut self,
        label: &str,
        pipeline: &wgpu::ComputePipeline,
        bind_group: &wgpu::BindGroup,
        (x, y, z): (u32, u32, u32),
    ) {
        let mut compute_pass = self.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
        });
        compute_pass.set_pipeline(pipeline);
        compute_pass.set_bind_group(0, bind_group, &[]);
        compute_pass.dispatch_workgroups(x, y, z);
    }
}

/// Records `function` into a fresh encoder labelled `label` and finishes it.
pub fn record(
    device: &wgpu::Device,
    label: &str,
    function: impl FnOnce(&mut wgpu::CommandEncoder),
) -> wgpu::CommandBuffer {
    let mut command_encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
    function(&mut command_encoder);
    command_encoder.finish()
}
