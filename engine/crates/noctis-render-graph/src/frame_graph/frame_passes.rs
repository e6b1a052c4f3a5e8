//! 每帧固定的 pass 序列
//!
//! 顺序固定，只按配置裁剪。每个 pass 在执行前都会通过 `RgBarrierPlanner`
//! 把声明的状态需求与状态表对齐，因此 pass 之间不会对资源状态做任何假设。

use ash::vk;
use glam::{UVec2, UVec3};

use noctis_gfx::resource_state::GfxResourceState;
use noctis_render_interface::frame_counter::FrameParity;
use noctis_render_interface::pipeline_settings::{DenoiserKind, UpscalerMode};

use super::frame_resources::{FrameResources, SHARC_CAPACITY};
use super::pass::{RgDenoiseStage, RgPassBuilder, RgPassKind, RgPassNode};

/// confidence 模糊的迭代次数
///
/// 必须是奇数：结果落在 pong 上，与第一次迭代的输入（ping）不是同一个资源。
pub const CONFIDENCE_BLUR_ITERATIONS: usize = 5;
const _: () = assert!(CONFIDENCE_BLUR_ITERATIONS % 2 == 1);

/// 计算着色器的 thread group 尺寸
const GROUP_SIZE: u32 = 16;
const SHARC_RESOLVE_GROUP_SIZE: u32 = 256;

/// 生成 pass 序列所需的每帧信息
///
/// 同一帧内的所有分支都由它决定，不会在帧中途改变。
#[derive(Clone, Copy, Debug)]
pub struct RgFrameContext {
    pub frame_index: u64,
    pub parity: FrameParity,
    pub denoiser: DenoiserKind,
    pub upscaler: UpscalerMode,
    /// 本帧 acquire 到的 swapchain image
    pub swapchain_image: usize,
    /// 实际渲染的矩形（动态分辨率）
    pub rect_size: UVec2,
    pub output_extent: vk::Extent2D,
    pub sharc_extent: vk::Extent2D,
    /// 辐射度缓存刚刚创建，内容没有意义（第一帧或 resize 之后）
    pub clear_radiance_cache: bool,
}

#[inline]
fn group_count(width: u32, height: u32) -> UVec3 {
    UVec3::new(width.div_ceil(GROUP_SIZE), height.div_ceil(GROUP_SIZE), 1)
}

/// 生成当前帧的 pass 序列
pub fn build_frame_passes(res: &FrameResources, ctx: &RgFrameContext) -> Vec<RgPassNode> {
    let mut passes = Vec::with_capacity(24);

    let rect_groups = group_count(ctx.rect_size.x, ctx.rect_size.y);
    let output_groups = group_count(ctx.output_extent.width, ctx.output_extent.height);
    let sharc_groups = group_count(ctx.sharc_extent.width, ctx.sharc_extent.height);

    let shader_read = GfxResourceState::SHADER_READ_COMPUTE;
    let storage = GfxResourceState::STORAGE_READ_WRITE_COMPUTE;
    let buffer_read = GfxResourceState::BUFFER_READ_COMPUTE;
    let buffer_storage = GfxResourceState::BUFFER_STORAGE_READ_WRITE_COMPUTE;
    let as_read = GfxResourceState::ACCELERATION_STRUCTURE_READ_COMPUTE;
    let constants = GfxResourceState::BUFFER_UNIFORM_READ_COMPUTE;

    // ============ 与分辨率无关的更新 ============
    {
        passes.push(
            RgPassBuilder::new("Update constants")
                .write(res.frame_constants, GfxResourceState::BUFFER_TRANSFER_DST)
                .build(RgPassKind::UpdateConstants {
                    dst: res.frame_constants,
                }),
        );

        let mut streamer = RgPassBuilder::new("Streamer").write(res.instance_data, GfxResourceState::BUFFER_TRANSFER_DST);
        if ctx.clear_radiance_cache {
            streamer = streamer.write(res.sharc_accumulated, GfxResourceState::BUFFER_TRANSFER_DST);
        }
        passes.push(streamer.build(RgPassKind::StreamBuffer { dst: res.instance_data }));

        if ctx.clear_radiance_cache {
            passes.push(
                RgPassBuilder::new("Zero radiance cache")
                    .write(res.sharc_accumulated, GfxResourceState::BUFFER_TRANSFER_DST)
                    .build(RgPassKind::FillBuffer {
                        dst: res.sharc_accumulated,
                        value: 0,
                    }),
            );
        }

        passes.push(
            RgPassBuilder::new("Build TLAS")
                .read(res.instance_data, GfxResourceState::ACCELERATION_STRUCTURE_BUILD_INPUT)
                .write_all(
                    [res.world_scratch, res.light_scratch, res.tlas_world, res.tlas_emissive],
                    GfxResourceState::ACCELERATION_STRUCTURE_BUILD_WRITE,
                )
                .build(RgPassKind::BuildAccelerationStructures {
                    targets: res.tlas().to_vec(),
                }),
        );
    }

    // ============ 辐射度缓存 ============
    {
        passes.push(
            RgPassBuilder::new("SHARC update")
                .read_all(res.tlas(), as_read)
                .read_all([res.instance_data, res.primitive_data], buffer_read)
                .read(res.sharc_radiance.previous(ctx.parity), shader_read)
                .write(res.sharc_radiance.current(ctx.parity), storage)
                .write(res.confidence.ping(), storage)
                .write_all(res.sharc_buffers(), buffer_storage)
                .build(RgPassKind::Dispatch {
                    pipeline: "sharc_update",
                    group_count: sharc_groups,
                }),
        );

        // 与 update 的状态完全相同，靠 hazard barrier 保证写入可见
        passes.push(
            RgPassBuilder::new("SHARC resolve")
                .write_all(res.sharc_buffers(), buffer_storage)
                .build(RgPassKind::Dispatch {
                    pipeline: "sharc_resolve",
                    group_count: UVec3::new((SHARC_CAPACITY as u32).div_ceil(SHARC_RESOLVE_GROUP_SIZE), 1, 1),
                }),
        );

        for iteration in 0..CONFIDENCE_BLUR_ITERATIONS {
            let (input, output) = res.confidence.iteration(iteration);
            passes.push(
                RgPassBuilder::new(format!("Confidence blur #{iteration}"))
                    .read(input, shader_read)
                    .write(output, storage)
                    .build(RgPassKind::Dispatch {
                        pipeline: "confidence_blur",
                        group_count: sharc_groups,
                    }),
            );
        }
    }

    // ============ 主光线追踪 ============
    passes.push(
        RgPassBuilder::new("Trace opaque")
            .read(res.frame_constants, constants)
            .read_all(res.tlas(), as_read)
            .read_all([res.instance_data, res.primitive_data], buffer_read)
            .read_all([res.sharc_hash_entries, res.sharc_resolved], buffer_read)
            // 上一帧的合成结果
            .read_all([res.composed_diff, res.composed_spec_view_z], shader_read)
            .write_all(
                [
                    res.view_z,
                    res.mv,
                    res.normal_roughness,
                    res.psr_throughput,
                    res.base_color_metalness,
                    res.direct_lighting,
                    res.direct_emission,
                    res.unfiltered_penumbra,
                    res.unfiltered_diff,
                    res.unfiltered_spec,
                    res.unfiltered_translucency,
                ],
                storage,
            )
            .build(RgPassKind::Dispatch {
                pipeline: "trace_opaque",
                group_count: rect_groups,
            }),
    );

    // ============ 降噪 ============
    passes.push(RgPassBuilder::new("Denoise shadow").build(RgPassKind::Denoise(RgDenoiseStage::Shadow)));
    passes.push(RgPassBuilder::new("Denoise opaque").build(RgPassKind::Denoise(RgDenoiseStage::Opaque)));

    // ============ 合成 ============
    passes.push(
        RgPassBuilder::new("Composition")
            .read_all(res.tlas(), as_read)
            .read_all(
                [
                    res.view_z,
                    res.normal_roughness,
                    res.base_color_metalness,
                    res.direct_lighting,
                    res.direct_emission,
                    res.psr_throughput,
                    res.shadow,
                    res.diff,
                    res.spec,
                ],
                shader_read,
            )
            .write_all([res.composed_diff, res.composed_spec_view_z], storage)
            .build(RgPassKind::Dispatch {
                pipeline: "composition",
                group_count: rect_groups,
            }),
    );

    passes.push(
        RgPassBuilder::new("Trace transparent")
            .read_all(res.tlas(), as_read)
            .read_all([res.instance_data, res.primitive_data], buffer_read)
            .read_all([res.composed_diff, res.composed_spec_view_z], shader_read)
            .write_all([res.composed, res.mv, res.normal_roughness], storage)
            .build(RgPassKind::Dispatch {
                pipeline: "trace_transparent",
                group_count: rect_groups,
            }),
    );

    if ctx.denoiser == DenoiserKind::Reference {
        passes.push(
            RgPassBuilder::new("Reference accumulation")
                .build(RgPassKind::Denoise(RgDenoiseStage::ReferenceOverride)),
        );
    }

    // ============ 输出分辨率 ============
    let sharpen_input = if ctx.upscaler.is_enabled() {
        let is_rr = ctx.upscaler.is_reconstruction();

        let mut before = RgPassBuilder::new("Before upscaling")
            .read_all([res.normal_roughness, res.base_color_metalness, res.spec], shader_read)
            .write(res.view_z, storage);
        if is_rr {
            before = before.write_all(res.rr_guides(), storage);
        }
        passes.push(before.build(RgPassKind::Dispatch {
            pipeline: "before_upscaling",
            group_count: rect_groups,
        }));

        let mut upscale = RgPassBuilder::new("Temporal upscale")
            .read_all([res.view_z, res.mv, res.composed], shader_read);
        upscale = if is_rr {
            upscale.read_all(res.rr_guides(), shader_read)
        } else {
            upscale.read(res.normal_roughness, shader_read)
        };
        passes.push(upscale.write(res.upscaler_output, storage).build(RgPassKind::TemporalUpscale {
            input: res.composed,
            output: res.upscaler_output,
        }));

        passes.push(
            RgPassBuilder::new("After upscaling")
                .write(res.upscaler_output, storage)
                .build(RgPassKind::Dispatch {
                    pipeline: "after_upscaling",
                    group_count: output_groups,
                }),
        );

        res.upscaler_output
    } else {
        // TAA 关闭时权重为 1，pass 仍然执行以维持 history
        let history = res.taa_history.current(ctx.parity);
        passes.push(
            RgPassBuilder::new("TAA")
                .read(res.frame_constants, constants)
                .read_all([res.mv, res.composed, res.taa_history.previous(ctx.parity)], shader_read)
                .write(history, storage)
                .build(RgPassKind::Dispatch {
                    pipeline: "taa",
                    group_count: rect_groups,
                }),
        );
        history
    };

    passes.push(
        RgPassBuilder::new("Sharpen")
            .read(sharpen_input, shader_read)
            .write(res.pre_final, storage)
            .build(RgPassKind::Sharpen {
                input: sharpen_input,
                output: res.pre_final,
            }),
    );

    passes.push(
        RgPassBuilder::new("Final")
            .read_all([res.pre_final, res.composed, res.validation], shader_read)
            .write(res.final_color, storage)
            .build(RgPassKind::Dispatch {
                pipeline: "final",
                group_count: output_groups,
            }),
    );

    // ============ 呈现 ============
    let swapchain_image = res.swapchain_image(ctx.swapchain_image);
    passes.push(
        RgPassBuilder::new("Copy to swapchain")
            .read(res.final_color, GfxResourceState::TRANSFER_SRC)
            .write(swapchain_image, GfxResourceState::TRANSFER_DST)
            .build(RgPassKind::CopyTexture {
                src: res.final_color,
                dst: swapchain_image,
            }),
    );
    passes.push(
        RgPassBuilder::new("Present")
            .write(swapchain_image, GfxResourceState::PRESENT)
            .build(RgPassKind::Present { image: swapchain_image }),
    );

    passes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_graph::{RgBarrierPlanner, RgResourceStateTable};
    use noctis_gfx::headless::HeadlessDevice;
    use noctis_render_interface::gfx_resource_manager::GfxResourceManager;
    use noctis_render_interface::pipeline_settings::FrameSettings;

    struct Fixture {
        device: HeadlessDevice,
        manager: GfxResourceManager,
        table: RgResourceStateTable,
        resources: Option<FrameResources>,
        frame: FrameSettings,
    }

    impl Fixture {
        fn new() -> Self {
            let frame = FrameSettings {
                render_width: 64,
                render_height: 64,
                output_width: 128,
                output_height: 128,
                swapchain_image_cnt: 2,
                ..Default::default()
            };
            let mut device = HeadlessDevice::new(frame.swapchain_image_cnt, frame.output_extent());
            let mut manager = GfxResourceManager::new();
            let mut table = RgResourceStateTable::new();
            let resources = FrameResources::create(&mut device, &mut manager, &mut table, &frame);
            Self {
                device,
                manager,
                table,
                resources: Some(resources),
                frame,
            }
        }

        fn res(&self) -> &FrameResources {
            self.resources.as_ref().unwrap()
        }

        fn ctx(&self, frame_index: u64, denoiser: DenoiserKind, upscaler: UpscalerMode) -> RgFrameContext {
            RgFrameContext {
                frame_index,
                parity: FrameParity::from_frame_index(frame_index),
                denoiser,
                upscaler,
                swapchain_image: (frame_index % 2) as usize,
                rect_size: self.frame.rect_size(1.0),
                output_extent: self.frame.output_extent(),
                sharc_extent: self.frame.sharc_extent(),
                clear_radiance_cache: frame_index == 0,
            }
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            if let Some(resources) = self.resources.take() {
                resources.destroy(&mut self.device, &mut self.manager, &mut self.table);
            }
            self.manager.destroy_mut(&mut self.device);
        }
    }

    fn names(passes: &[RgPassNode]) -> Vec<&str> {
        passes.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_default_pass_order() {
        let fx = Fixture::new();
        let passes = build_frame_passes(fx.res(), &fx.ctx(3, DenoiserKind::Reblur, UpscalerMode::Off));
        assert_eq!(
            names(&passes),
            vec![
                "Update constants",
                "Streamer",
                "Build TLAS",
                "SHARC update",
                "SHARC resolve",
                "Confidence blur #0",
                "Confidence blur #1",
                "Confidence blur #2",
                "Confidence blur #3",
                "Confidence blur #4",
                "Trace opaque",
                "Denoise shadow",
                "Denoise opaque",
                "Composition",
                "Trace transparent",
                "TAA",
                "Sharpen",
                "Final",
                "Copy to swapchain",
                "Present",
            ]
        );
    }

    #[test]
    fn test_first_frame_zeroes_radiance_cache() {
        let fx = Fixture::new();
        let passes = build_frame_passes(fx.res(), &fx.ctx(0, DenoiserKind::Relax, UpscalerMode::Off));
        assert_eq!(passes[2].name, "Zero radiance cache");
        assert!(passes[1].writes_to(fx.res().sharc_accumulated));

        let later = build_frame_passes(fx.res(), &fx.ctx(1, DenoiserKind::Relax, UpscalerMode::Off));
        assert!(!later[1].touches(fx.res().sharc_accumulated));
        assert!(later.iter().all(|p| p.name != "Zero radiance cache"));

        // 重新创建资源之后，即使不是第一帧也要清零
        let recreated = RgFrameContext {
            clear_radiance_cache: true,
            ..fx.ctx(7, DenoiserKind::Relax, UpscalerMode::Off)
        };
        let passes = build_frame_passes(fx.res(), &recreated);
        assert_eq!(passes[2].name, "Zero radiance cache");
        assert!(passes[1].writes_to(fx.res().sharc_accumulated));
    }

    #[test]
    fn test_constants_uploaded_before_use() {
        let fx = Fixture::new();
        let res = fx.res();
        let passes = build_frame_passes(res, &fx.ctx(4, DenoiserKind::Reblur, UpscalerMode::Off));

        assert_eq!(passes[0].kind, RgPassKind::UpdateConstants { dst: res.frame_constants });
        assert_eq!(passes[0].required_state(res.frame_constants), Some(GfxResourceState::BUFFER_TRANSFER_DST));
        for name in ["Trace opaque", "TAA"] {
            let pass = passes.iter().find(|p| p.name == name).unwrap();
            assert_eq!(pass.required_state(res.frame_constants), Some(GfxResourceState::BUFFER_UNIFORM_READ_COMPUTE));
        }
    }

    #[test]
    fn test_reference_and_upscaler_branches() {
        let fx = Fixture::new();
        let res = fx.res();

        let reference = build_frame_passes(res, &fx.ctx(5, DenoiserKind::Reference, UpscalerMode::Sr));
        let names = names(&reference);
        let reference_at = names.iter().position(|n| *n == "Reference accumulation").unwrap();
        assert_eq!(names[reference_at - 1], "Trace transparent");
        assert!(names.contains(&"Temporal upscale"));
        assert!(!names.contains(&"TAA"));

        let sr_upscale = reference.iter().find(|p| p.name == "Temporal upscale").unwrap();
        assert!(!sr_upscale.touches(res.rr_guide_diff_albedo));

        let rr = build_frame_passes(res, &fx.ctx(5, DenoiserKind::Reblur, UpscalerMode::Rr));
        let rr_upscale = rr.iter().find(|p| p.name == "Temporal upscale").unwrap();
        assert!(res.rr_guides().iter().all(|guide| rr_upscale.touches(*guide)));

        let sharpen = rr.iter().find(|p| p.name == "Sharpen").unwrap();
        assert_eq!(
            sharpen.kind,
            RgPassKind::Sharpen {
                input: res.upscaler_output,
                output: res.pre_final
            }
        );
    }

    #[test]
    fn test_confidence_blur_ends_on_pong() {
        let fx = Fixture::new();
        let res = fx.res();
        let passes = build_frame_passes(res, &fx.ctx(2, DenoiserKind::Reblur, UpscalerMode::Off));

        let blur: Vec<_> = passes.iter().filter(|p| p.name.starts_with("Confidence blur")).collect();
        assert_eq!(blur.len(), CONFIDENCE_BLUR_ITERATIONS);
        assert!(blur[0].writes_to(res.confidence.pong()));
        assert!(blur.last().unwrap().writes_to(res.confidence.final_output(CONFIDENCE_BLUR_ITERATIONS)));
        assert_eq!(res.confidence.final_output(CONFIDENCE_BLUR_ITERATIONS), res.confidence.pong());
    }

    #[test]
    fn test_taa_history_alternates_by_parity() {
        let fx = Fixture::new();
        let res = fx.res();
        for frame_index in 0..4 {
            let ctx = fx.ctx(frame_index, DenoiserKind::Reblur, UpscalerMode::Off);
            let passes = build_frame_passes(res, &ctx);
            let taa = passes.iter().find(|p| p.name == "TAA").unwrap();
            assert!(taa.writes_to(res.taa_history.current(ctx.parity)));
            assert_eq!(taa.required_state(res.taa_history.previous(ctx.parity)), Some(GfxResourceState::SHADER_READ_COMPUTE));
        }
    }

    #[test]
    fn test_sharc_resolve_always_gets_hazard_barriers() {
        let mut fx = Fixture::new();
        for frame_index in 0..2 {
            let ctx = fx.ctx(frame_index, DenoiserKind::Reblur, UpscalerMode::Off);
            let resources = fx.resources.take().unwrap();
            let passes = build_frame_passes(&resources, &ctx);
            for pass in &passes {
                let barriers = RgBarrierPlanner::plan(&mut fx.table, &pass.requirements());
                if pass.name == "SHARC resolve" {
                    assert_eq!(barriers.len(), 3);
                    assert!(barriers.iter().all(|b| b.is_hazard()));
                }
            }
            // 帧结束时 swapchain image 处于 present 状态
            assert_eq!(
                fx.table.get(resources.swapchain_image(ctx.swapchain_image)),
                GfxResourceState::PRESENT
            );
            fx.resources = Some(resources);
        }
    }
}
