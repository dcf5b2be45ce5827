use std::error::Error;

use cleave_core::{CleaveError, Pipeline, StageState};

#[test]
fn items_flow_through_stages_in_order() -> Result<(), Box<dyn Error>> {
    let pipeline = Pipeline::builder(4)
        .stage("double", |x: u64| Ok(x * 2))
        .stage("increment", |x: u64| Ok(x + 1))
        .build()?;

    let results = pipeline.run(0..100u64).into_vec()?;
    let expected: Vec<u64> = (0..100u64).map(|x| x * 2 + 1).collect();
    assert_eq!(results, expected);
    Ok(())
}

#[test]
fn small_capacity_does_not_deadlock() -> Result<(), Box<dyn Error>> {
    let pipeline = Pipeline::builder(1)
        .stage("a", |x: u64| Ok(x + 1))
        .stage("b", |x: u64| Ok(x + 1))
        .stage("c", |x: u64| Ok(x + 1))
        .build()?;

    let results = pipeline.run(0..10_000u64).into_vec()?;
    assert_eq!(results.len(), 10_000);
    assert_eq!(results[0], 3);
    Ok(())
}

#[test]
fn stage_error_fails_fast_after_in_flight_items() -> Result<(), Box<dyn Error>> {
    let pipeline = Pipeline::builder(4)
        .stage("validate", |x: u64| {
            if x == 10 {
                Err(CleaveError::Boundary("unacceptable item"))
            } else {
                Ok(x)
            }
        })
        .stage("passthrough", |x: u64| Ok(x))
        .build()?;

    let mut handle = pipeline.run(0..1000u64);
    let mut delivered = Vec::new();
    let mut failure = None;
    for item in handle.by_ref() {
        match item {
            Ok(x) => delivered.push(x),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    // Items 0..=9 made it past the failing stage before item 10 errored.
    assert_eq!(delivered, (0..10u64).collect::<Vec<_>>());
    let failure = failure.expect("pipeline must surface the stage error");
    assert!(matches!(failure, CleaveError::Stage { stage, .. } if stage == "validate"));
    assert!(handle.next().is_none(), "error is yielded exactly once");
    Ok(())
}

#[test]
fn stages_report_stopped_after_drain() -> Result<(), Box<dyn Error>> {
    let pipeline = Pipeline::builder(2)
        .stage("one", |x: u64| Ok(x))
        .stage("two", |x: u64| Ok(x))
        .build()?;

    let mut handle = pipeline.run(0..50u64);
    let mut count = 0;
    while let Some(item) = handle.next() {
        item?;
        count += 1;
    }
    assert_eq!(count, 50);
    assert_eq!(handle.stage_state(0), Some(StageState::Stopped));
    assert_eq!(handle.stage_state(1), Some(StageState::Stopped));
    assert_eq!(handle.stage_state(2), None);
    Ok(())
}

#[test]
fn empty_input_completes_cleanly() -> Result<(), Box<dyn Error>> {
    let pipeline = Pipeline::builder(4)
        .stage("noop", |x: u64| Ok(x))
        .build()?;
    let results = pipeline.run(std::iter::empty()).into_vec()?;
    assert!(results.is_empty());
    Ok(())
}

#[test]
fn builder_rejects_degenerate_pipelines() {
    assert!(Pipeline::<u64>::builder(4).build().is_err());
    assert!(
        Pipeline::builder(0)
            .stage("noop", |x: u64| Ok(x))
            .build()
            .is_err()
    );
}

#[test]
fn dropping_a_running_pipeline_does_not_hang() -> Result<(), Box<dyn Error>> {
    let pipeline = Pipeline::builder(1)
        .stage("slow", |x: u64| {
            std::thread::sleep(std::time::Duration::from_millis(1));
            Ok(x)
        })
        .build()?;
    let mut handle = pipeline.run(0..100_000u64);
    assert!(handle.next().is_some());
    drop(handle);
    Ok(())
}
