use crate::error::EngineError;

/// Workgroup `y` size of every generated kernel.
pub const FRACTAL_WORKGROUP_SIZE_Y: u32 = 64;

/// Dispatch `y` size. The kernel computes its pixel index as
/// `global_id.x * (FRACTAL_DISPATCH_SIZE_Y * FRACTAL_WORKGROUP_SIZE_Y) + global_id.y`.
pub const FRACTAL_DISPATCH_SIZE_Y: u32 = 1024;

/**
Dispatch size for a generated kernel over `total_work` pixels.

[WGSL compute shader workgroups reference](https://www.w3.org/TR/WGSL/#compute-shader-workgroups)

One invocation runs per pixel. A single dispatch dimension tops out at
[maxComputeWorkgroupsPerDimension](https://www.w3.org/TR/webgpu/#dom-supported-limits-maxcomputeworkgroupsperdimension)
(65535), which a 256x256 image already exceeds, so the work is laid out in two
dimensions.

With `@workgroup_size(1, 64, 1)` and a dispatch `y` of 1024, each step in `x`
covers `1024 * 64 = 65536` pixels. Dispatching `(total_work / 65536 + 1, 1024, 1)`
covers every pixel, with up to 65536 surplus invocations that the kernel skips
by comparing its index against `width * height`.
*/
pub fn fractal_dispatch_size(total_work: usize) -> Result<(u32, u32, u32), EngineError> {
    let x = (total_work / (FRACTAL_DISPATCH_SIZE_Y * FRACTAL_WORKGROUP_SIZE_Y) as usize + 1)
        .try_into()
        .map_err(|_| {
            EngineError::InvalidConfiguration(format!(
                "{} pixels do not fit in one dispatch",
                total_work
            ))
        })?;
    Ok((x, FRACTAL_DISPATCH_SIZE_Y, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_covers_every_pixel() {
        for total_work in [1, 256, 65535, 65536, 65537, 1920 * 1080] {
            let (x, y, z) = fractal_dispatch_size(total_work).unwrap();
            let invocations = x as usize * y as usize * FRACTAL_WORKGROUP_SIZE_Y as usize * z as usize;
            assert!(invocations >= total_work, "{total_work}");
            assert!(invocations - total_work <= 65536, "{total_work}");
        }
    }
}
