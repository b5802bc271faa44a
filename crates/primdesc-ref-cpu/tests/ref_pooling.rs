use anyhow::Result;
use proptest::prelude::*;

use primdesc::pooling::PoolingWindow;
use primdesc::primitive::RoundMode;
use primdesc::registry::{
    create_pooling_bwd_pd_with_policy, create_pooling_fwd_pd_with_policy, has_pooling_impl,
    CreateError, Direction, ImplPolicy,
};
use primdesc::{
    DType, Engine, MemoryFormat, PoolingAlg, PoolingBwdPd, PoolingDesc, PoolingFwdPd, PoolingPd,
    PrimitiveAttr, PrimitiveDesc, PropKind, Query, TensorDesc,
};
use primdesc_ref_cpu::{register_ref_pooling, workspace_dtype, REF_IMPL_NAME};

fn force_ref() -> ImplPolicy {
    ImplPolicy::Force {
        implementation: REF_IMPL_NAME.to_string(),
    }
}

fn window() -> PoolingWindow {
    PoolingWindow::new([3, 3], [2, 2], [1, 1], [1, 1])
}

fn forward_desc(prop_kind: PropKind, alg: PoolingAlg, dtype: DType) -> PoolingDesc {
    PoolingDesc::forward(
        prop_kind,
        alg,
        TensorDesc::nchw_any(2, 16, 9, 9, dtype),
        TensorDesc::nchw_any(2, 16, 5, 5, dtype),
        window(),
    )
    .expect("valid forward desc")
}

fn backward_desc(alg: PoolingAlg) -> PoolingDesc {
    PoolingDesc::backward(
        alg,
        TensorDesc::nchw_any(2, 16, 9, 9, DType::F32),
        TensorDesc::nchw_any(2, 16, 5, 5, DType::F32),
        window(),
    )
    .expect("valid backward desc")
}

fn create_fwd(desc: &PoolingDesc) -> Result<PoolingFwdPd<'static>, CreateError> {
    register_ref_pooling();
    create_pooling_fwd_pd_with_policy(
        Engine::cpu(),
        desc,
        PrimitiveAttr::default(),
        None,
        &force_ref(),
    )
}

fn create_bwd<'h>(
    desc: &PoolingDesc,
    hint: &'h PoolingFwdPd<'h>,
) -> Result<PoolingBwdPd<'h>, CreateError> {
    create_pooling_bwd_pd_with_policy(
        Engine::cpu(),
        desc,
        PrimitiveAttr::default(),
        hint,
        &force_ref(),
    )
}

#[test]
fn reference_implementation_is_registered_for_both_directions() {
    register_ref_pooling();
    assert!(has_pooling_impl(Direction::Forward, REF_IMPL_NAME));
    assert!(has_pooling_impl(Direction::Backward, REF_IMPL_NAME));
}

#[test]
fn max_training_forward_exposes_a_workspace() -> Result<()> {
    let desc = forward_desc(PropKind::ForwardTraining, PoolingAlg::Max, DType::F32);
    let pd = create_fwd(&desc)?;

    assert_eq!(pd.impl_name(), REF_IMPL_NAME);
    assert_eq!(pd.input_port_count(), 1);
    assert_eq!(pd.output_port_count(), 2);
    let ws = pd.output_port(1).expect("workspace port");
    assert_eq!(ws.dims(), &[2, 16, 5, 5]);
    assert_eq!(ws.dtype(), DType::Ui8);
    assert_eq!(ws.format(), MemoryFormat::Nchw);
    assert_eq!(ws.byte_len(), Some(2 * 16 * 5 * 5));
    assert_eq!(
        pd.query(Query::ImplInfo, 0).ok().and_then(|v| v.as_impl_info()),
        Some(REF_IMPL_NAME)
    );
    Ok(())
}

#[test]
fn inference_and_average_forward_have_no_workspace() -> Result<()> {
    let cases = [
        (PropKind::ForwardInference, PoolingAlg::Max),
        (PropKind::ForwardTraining, PoolingAlg::AvgIncludePadding),
        (PropKind::ForwardInference, PoolingAlg::AvgExcludePadding),
    ];
    for (prop_kind, alg) in cases {
        let desc = forward_desc(prop_kind, alg, DType::F32);
        let pd = create_fwd(&desc)?;
        assert_eq!(pd.output_port_count(), 1, "{prop_kind:?} {alg:?}");
        assert!(pd.output_port(1).is_none());
        assert!(!pd.has_workspace());
    }
    Ok(())
}

#[test]
fn max_backward_mirrors_the_hint_workspace() -> Result<()> {
    let forward = forward_desc(PropKind::ForwardTraining, PoolingAlg::Max, DType::F32);
    let hint = create_fwd(&forward)?;
    let backward = backward_desc(PoolingAlg::Max);
    let pd = create_bwd(&backward, &hint)?;

    assert_eq!(pd.input_port_count(), 2);
    assert_eq!(pd.output_port_count(), 1);
    let bwd_ws = pd.input_port(1).expect("backward workspace");
    let fwd_ws = hint.workspace_md(0).expect("forward workspace");
    assert_eq!(bwd_ws.dims(), fwd_ws.dims());
    assert_eq!(bwd_ws.dtype(), fwd_ws.dtype());
    assert_eq!(pd.output_port(0).map(|md| md.dims().to_vec()), Some(vec![2, 16, 9, 9]));
    assert_eq!((pd.ih(), pd.oh(), pd.kh(), pd.pad_t()), (9, 5, 3, 1));
    Ok(())
}

#[test]
fn max_backward_declines_a_hint_without_workspace() -> Result<()> {
    let forward = forward_desc(PropKind::ForwardInference, PoolingAlg::Max, DType::F32);
    let hint = create_fwd(&forward)?;
    let backward = backward_desc(PoolingAlg::Max);

    match create_bwd(&backward, &hint) {
        Err(CreateError::NoImplementation {
            direction: Direction::Backward,
            rejections,
            ..
        }) => {
            assert_eq!(rejections.len(), 1);
            assert!(rejections[0].1.to_string().contains("workspace"));
        }
        other => panic!("expected the reference backward to decline, got {other:?}"),
    }
    Ok(())
}

#[test]
fn average_backward_has_a_single_input() -> Result<()> {
    let forward = forward_desc(
        PropKind::ForwardInference,
        PoolingAlg::AvgExcludePadding,
        DType::F32,
    );
    let hint = create_fwd(&forward)?;
    let backward = backward_desc(PoolingAlg::AvgExcludePadding);
    let pd = create_bwd(&backward, &hint)?;

    assert_eq!(pd.input_port_count(), 1);
    assert!(pd.input_port(1).is_none());
    assert!(pd.workspace_md(0).is_none());
    Ok(())
}

#[test]
fn nhwc_layout_carries_into_the_workspace() -> Result<()> {
    let src = TensorDesc::new([1, 8, 4, 4], DType::Si8, MemoryFormat::Nhwc);
    let dst = TensorDesc::new([1, 8, 2, 2], DType::Si8, MemoryFormat::Nhwc);
    let desc = PoolingDesc::forward(
        PropKind::ForwardTraining,
        PoolingAlg::Max,
        src,
        dst,
        PoolingWindow::square(2, 2),
    )?;
    let pd = create_fwd(&desc)?;

    assert_eq!(pd.input_port(0).map(|md| md.format()), Some(MemoryFormat::Nhwc));
    let ws = pd.workspace_md(0).expect("workspace");
    assert_eq!(ws.format(), MemoryFormat::Nhwc);
    assert_eq!(desc.accum_dtype, DType::Si32);
    Ok(())
}

#[test]
fn unsupported_dtypes_are_declined() -> Result<()> {
    for dtype in [DType::Bf16, DType::F16, DType::Si16] {
        let desc = forward_desc(PropKind::ForwardInference, PoolingAlg::Max, dtype);
        let err = create_fwd(&desc).unwrap_err();
        let declined = matches!(
            &err,
            CreateError::NoImplementation { rejections, .. } if rejections.len() == 1
        );
        assert!(declined, "{dtype:?}: {err}");
    }
    Ok(())
}

#[test]
fn integer_averages_only_round_to_nearest() -> Result<()> {
    register_ref_pooling();
    let round_down = PrimitiveAttr {
        round_mode: RoundMode::Down,
    };
    let create = |alg, dtype| {
        let desc = forward_desc(PropKind::ForwardInference, alg, dtype);
        create_pooling_fwd_pd_with_policy(
            Engine::cpu(),
            &desc,
            round_down.clone(),
            None,
            &force_ref(),
        )
        .map(|pd| pd.attr().round_mode)
    };

    match create(PoolingAlg::AvgIncludePadding, DType::Si8) {
        Err(CreateError::NoImplementation { rejections, .. }) => {
            assert!(rejections[0].1.to_string().contains("round mode"));
        }
        other => panic!("expected s8 average with round-down to be declined, got {other:?}"),
    }
    assert_eq!(create(PoolingAlg::Max, DType::Si8)?, RoundMode::Down);
    assert_eq!(create(PoolingAlg::AvgExcludePadding, DType::F32)?, RoundMode::Down);
    Ok(())
}

#[test]
fn workspace_dtype_widens_for_large_windows() {
    assert_eq!(workspace_dtype([2, 2]), DType::Ui8);
    assert_eq!(workspace_dtype([15, 17]), DType::Ui8);
    assert_eq!(workspace_dtype([16, 16]), DType::Si32);
    assert_eq!(workspace_dtype([usize::MAX, 2]), DType::Si32);
}

#[test]
fn large_kernel_forward_uses_si32_workspace() -> Result<()> {
    let desc = PoolingDesc::forward(
        PropKind::ForwardTraining,
        PoolingAlg::Max,
        TensorDesc::nchw_any(1, 1, 20, 20, DType::F32),
        TensorDesc::nchw_any(1, 1, 5, 5, DType::F32),
        PoolingWindow::new([16, 16], [1, 1], [0, 0], [0, 0]),
    )?;
    let pd = create_fwd(&desc)?;
    assert_eq!(pd.workspace_md(0).map(|md| md.dtype()), Some(DType::Si32));
    Ok(())
}

#[test]
fn descriptors_are_shareable_across_threads() -> Result<()> {
    let forward = forward_desc(PropKind::ForwardTraining, PoolingAlg::Max, DType::F32);
    let hint = create_fwd(&forward)?;
    let backward = backward_desc(PoolingAlg::Max);
    let pd = create_bwd(&backward, &hint)?;
    let expected = pd.to_string();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                assert_eq!(pd.to_string(), expected);
                assert_eq!(pd.input_port_count(), 2);
                assert_eq!(hint.output_port_count(), 2);
                let queried = pd
                    .query(Query::PoolingDesc, 0)
                    .ok()
                    .and_then(|v| v.as_pooling_desc());
                assert_eq!(queried, Some(&backward));
            });
        }
    });
    Ok(())
}

fn alg() -> impl Strategy<Value = PoolingAlg> {
    prop_oneof![
        Just(PoolingAlg::Max),
        Just(PoolingAlg::AvgIncludePadding),
        Just(PoolingAlg::AvgExcludePadding),
    ]
}

proptest! {
    #[test]
    fn workspace_present_only_for_max_training(
        alg in alg(),
        training in any::<bool>(),
        kernel in 1usize..5,
        extra in 0usize..6,
    ) {
        let prop_kind = if training {
            PropKind::ForwardTraining
        } else {
            PropKind::ForwardInference
        };
        let extent = kernel + extra;
        let desc = PoolingDesc::forward(
            prop_kind,
            alg,
            TensorDesc::nchw_any(1, 2, extent, extent, DType::F32),
            TensorDesc::nchw_any(1, 2, extra + 1, extra + 1, DType::F32),
            PoolingWindow::square(kernel, 1),
        )
        .expect("stride one window fits");
        let pd = create_fwd(&desc).expect("reference accepts f32");

        let expect_ws = alg == PoolingAlg::Max && training;
        prop_assert_eq!(pd.has_workspace(), expect_ws);
        prop_assert_eq!(pd.output_port_count(), 1 + usize::from(expect_ws));
    }
}
