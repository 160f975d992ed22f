use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, SystemTime};

use bytemuck::{Pod, Zeroable};

use super::*;
use crate::backend::fs::testing::FakeSources;
use crate::backend::headless::{BackendOp, HeadlessBackend};
use crate::backend::ShaderStage;

fn t(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

fn registry() -> (Rc<RefCell<HeadlessBackend>>, Rc<FakeSources>, ShaderRegistry) {
    let backend = Rc::new(RefCell::new(HeadlessBackend::new()));
    let sources = Rc::new(FakeSources::new());
    let registry = ShaderRegistry::new(
        Box::new(backend.clone()),
        Box::new(sources.clone()),
        ShaderConfig::default(),
    );
    (backend, sources, registry)
}

#[test]
fn add_and_lookup_vertex_shader() {
    let (backend, sources, mut registry) = registry();
    sources.set_write_time("shader.vs", t(100));

    registry
        .add_vertex_shader("main", Path::new("shader.vs"))
        .unwrap();

    assert!(registry.vertex_shader("main").is_some());
    assert_eq!(backend.borrow().creation_calls(), 1);

    // Lookups never go back to the backend.
    assert!(registry.vertex_shader("main").is_some());
    assert!(registry.vertex_shader("main").is_some());
    assert_eq!(backend.borrow().creation_calls(), 1);
}

#[test]
fn missing_lookups_return_none() {
    let (_backend, _sources, registry) = registry();

    assert!(registry.vertex_shader("nope").is_none());
    assert!(registry.pixel_shader("nope").is_none());
    assert!(registry.input_layout("nope").is_none());
    assert!(registry.constant_buffer("nope").is_none());
}

#[test]
fn failed_compile_leaves_previous_entry() {
    let (backend, sources, mut registry) = registry();
    sources.set_write_time("shader.vs", t(100));

    registry
        .add_vertex_shader("main", Path::new("shader.vs"))
        .unwrap();
    let original = registry.vertex_shader("main").unwrap().raw();

    backend.borrow_mut().fail_path("broken.vs");
    let result = registry.add_vertex_shader("main", Path::new("broken.vs"));
    assert!(matches!(result, Err(EngineError::CompileFailed { .. })));

    // The old handle is still registered and still live.
    assert_eq!(registry.vertex_shader("main").unwrap().raw(), original);
    assert_eq!(backend.borrow().live_handles(), 1);
}

#[test]
fn overwrite_releases_the_old_handle() {
    let (backend, sources, mut registry) = registry();
    sources.set_write_time("a.vs", t(100));
    sources.set_write_time("b.vs", t(100));

    registry.add_vertex_shader("main", Path::new("a.vs")).unwrap();
    let first = registry.vertex_shader("main").unwrap().raw();
    registry.add_vertex_shader("main", Path::new("b.vs")).unwrap();

    let backend = backend.borrow();
    assert!(backend.ops.contains(&BackendOp::Release(first)));
    assert_eq!(backend.live_handles(), 1);
}

#[test]
fn precompiled_shaders_use_binary_loaders() {
    let (backend, _sources, mut registry) = registry();

    registry
        .add_vertex_shader_precompiled("main", Path::new("main.vso"))
        .unwrap();
    registry
        .add_pixel_shader_precompiled("tone", Path::new("tone.pso"))
        .unwrap();

    let ops = &backend.borrow().ops;
    assert!(ops.contains(&BackendOp::LoadVertexShaderBinary("main.vso".into())));
    assert!(ops.contains(&BackendOp::LoadPixelShaderBinary("tone.pso".into())));
}

#[test]
fn input_layout_with_unknown_shader_is_rejected() {
    let (backend, _sources, mut registry) = registry();
    let desc: InputLayoutDesc = "POSITION:float3".parse().unwrap();

    let result = registry.add_input_layout("layout", "ghost", &desc);
    assert!(matches!(
        result,
        Err(EngineError::UnknownResource {
            kind: ResourceKind::VertexShader,
            ..
        })
    ));
    assert!(registry.input_layout("layout").is_none());
    assert_eq!(backend.borrow().creation_calls(), 0);
}

#[test]
fn input_layout_compiles_from_the_shader_source() {
    let (backend, sources, mut registry) = registry();
    sources.set_write_time("shader.vs", t(100));
    let desc: InputLayoutDesc = "POSITION:float3;COLOR:float4".parse().unwrap();

    registry
        .add_vertex_shader("main", Path::new("shader.vs"))
        .unwrap();
    registry.add_input_layout("layout", "main", &desc).unwrap();

    assert!(registry.input_layout("layout").is_some());
    assert!(backend
        .borrow()
        .ops
        .contains(&BackendOp::CompileInputLayout("shader.vs".into())));
}

#[test]
fn constant_buffer_update_binds_at_slot() {
    let (backend, _sources, mut registry) = registry();

    registry.add_constant_buffer("frame", 16).unwrap();
    let id = registry.constant_buffer("frame").unwrap().raw();
    registry
        .update_constant_buffer("frame", ShaderStage::Pixel, &[0u8; 16], 2)
        .unwrap();

    assert!(backend.borrow().ops.contains(&BackendOp::UpdateConstantBuffer {
        id,
        len: 16,
        slot: 2,
        stage: ShaderStage::Pixel,
    }));
}

#[test]
fn constant_buffer_update_rejects_wrong_size() {
    let (backend, _sources, mut registry) = registry();

    registry.add_constant_buffer("frame", 16).unwrap();
    let result = registry.update_constant_buffer("frame", ShaderStage::Vertex, &[0u8; 8], 0);
    assert!(matches!(result, Err(EngineError::BufferSize { .. })));

    let updates = backend
        .borrow()
        .ops
        .iter()
        .filter(|op| matches!(op, BackendOp::UpdateConstantBuffer { .. }))
        .count();
    assert_eq!(updates, 0);
}

#[test]
fn constant_buffer_update_from_pod_value() {
    #[repr(C)]
    #[derive(Clone, Copy, Pod, Zeroable)]
    struct FrameParams {
        tint: [f32; 4],
    }

    let (backend, _sources, mut registry) = registry();
    registry.add_constant_buffer("frame", 16).unwrap();

    let params = FrameParams {
        tint: [1.0, 0.5, 0.25, 1.0],
    };
    registry
        .update_constant_buffer_with("frame", ShaderStage::Vertex, &params, 0)
        .unwrap();

    assert!(backend
        .borrow()
        .ops
        .iter()
        .any(|op| matches!(op, BackendOp::UpdateConstantBuffer { len: 16, .. })));
}

#[test]
fn activating_unknown_name_binds_null_and_records_it() {
    let (backend, _sources, mut registry) = registry();

    registry.activate_vertex_shader("ghost");

    assert!(backend
        .borrow()
        .ops
        .contains(&BackendOp::BindVertexShader(None)));
    assert_eq!(registry.active().vertex_shader.as_deref(), Some("ghost"));
}

#[test]
fn refresh_active_rebinds_the_recorded_selection() {
    let (backend, sources, mut registry) = registry();
    sources.set_write_time("shader.vs", t(100));
    sources.set_write_time("shader.ps", t(100));
    let desc: InputLayoutDesc = "POSITION:float3".parse().unwrap();

    registry
        .add_vertex_shader("main", Path::new("shader.vs"))
        .unwrap();
    registry
        .add_pixel_shader("main", Path::new("shader.ps"))
        .unwrap();
    registry.add_input_layout("main", "main", &desc).unwrap();
    registry.activate_vertex_shader("main");
    registry.activate_pixel_shader("main");
    registry.activate_input_layout("main");

    let vs = registry.vertex_shader("main").unwrap().raw();
    let ps = registry.pixel_shader("main").unwrap().raw();
    let il = registry.input_layout("main").unwrap().raw();

    backend.borrow_mut().ops.clear();
    registry.refresh_active();

    let ops = &backend.borrow().ops;
    assert!(ops.contains(&BackendOp::BindVertexShader(Some(vs))));
    assert!(ops.contains(&BackendOp::BindPixelShader(Some(ps))));
    assert!(ops.contains(&BackendOp::BindInputLayout(Some(il))));
}

#[test]
fn refresh_with_nothing_active_binds_nothing() {
    let (backend, _sources, mut registry) = registry();

    registry.refresh_active();

    assert!(backend.borrow().ops.is_empty());
}

#[test]
fn release_all_frees_everything_and_forgets_names() {
    let (backend, sources, mut registry) = registry();
    sources.set_write_time("shader.vs", t(100));
    sources.set_write_time("shader.ps", t(100));
    let desc: InputLayoutDesc = "POSITION:float3".parse().unwrap();

    registry
        .add_vertex_shader("main", Path::new("shader.vs"))
        .unwrap();
    registry
        .add_pixel_shader("main", Path::new("shader.ps"))
        .unwrap();
    registry.add_input_layout("main", "main", &desc).unwrap();
    registry.add_constant_buffer("frame", 64).unwrap();
    registry.activate_vertex_shader("main");

    registry.release_all();

    assert!(registry.vertex_shader("main").is_none());
    assert!(registry.pixel_shader("main").is_none());
    assert!(registry.input_layout("main").is_none());
    assert!(registry.constant_buffer("frame").is_none());
    assert!(registry.active().vertex_shader.is_none());
    assert_eq!(backend.borrow().live_handles(), 0);
}
