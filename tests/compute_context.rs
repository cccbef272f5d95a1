// Run:
//   cargo test --test compute_context

use std::cell::RefCell;
use std::rc::Rc;

use creature_sim::compute::{
    BufferDesc, BufferHandle, ComputeBackend, ComputeContext, DeviceArray, HostProgram,
    KernelArgs, KernelId,
};
use creature_sim::{ComputeError, ComputeResult};

fn double(args: &KernelArgs<'_>) -> ComputeResult<()> {
    let n = args.work_size();
    let mut values = args.write::<i32>(0)?;
    for v in values.iter_mut().take(n) {
        *v *= 2;
    }
    Ok(())
}

fn sum_into(args: &KernelArgs<'_>) -> ComputeResult<()> {
    let input = args.read::<i16>(0)?;
    let mut out = args.write::<i32>(1)?;
    out[0] = input.iter().map(|&v| v as i32).sum();
    Ok(())
}

fn context() -> ComputeResult<ComputeContext> {
    let program = HostProgram::new("test")
        .with_kernel("double", double)
        .with_kernel("sum", sum_into);
    ComputeContext::host(program, &["double", "sum"])
}

#[test]
fn dispatch_runs_bound_kernel() -> ComputeResult<()> {
    let mut ctx = context()?;
    let mut values = DeviceArray::new(&mut ctx, "values", vec![1, 2, 3, 4])?;
    values.bind(&mut ctx, "double", 0)?;

    ctx.dispatch("double", 3)?;
    ctx.finish()?;
    values.download(&mut ctx)?;
    assert_eq!(values.host(), &[2, 4, 6, 4]);
    assert_eq!(ctx.dispatch_count("double")?, 1);

    values.host_mut()[3] = 10;
    values.upload(&mut ctx)?;
    ctx.dispatch("double", 4)?;
    values.download(&mut ctx)?;
    assert_eq!(values.host(), &[4, 8, 12, 20]);
    Ok(())
}

#[test]
fn narrow_elements_round_trip_through_words() -> ComputeResult<()> {
    let mut ctx = context()?;
    let input = DeviceArray::new(&mut ctx, "input", vec![-3i16, 7, 100])?;
    let mut total = DeviceArray::<i32>::zeroed(&mut ctx, "total", 1)?;
    input.bind(&mut ctx, "sum", 0)?;
    total.bind(&mut ctx, "sum", 1)?;

    ctx.dispatch("sum", 1)?;
    total.download(&mut ctx)?;
    assert_eq!(total.host(), &[104]);
    Ok(())
}

#[test]
fn missing_entry_point_fails_compilation() {
    let program = HostProgram::new("partial").with_kernel("double", double);
    let err = ComputeContext::host(program, &["double", "sum"]).unwrap_err();
    assert!(matches!(err, ComputeError::ProgramCompile { .. }));
}

#[test]
fn unknown_kernel_is_rejected() -> ComputeResult<()> {
    let mut ctx = context()?;
    assert!(matches!(ctx.dispatch("triple", 1), Err(ComputeError::UnknownKernel(_))));
    assert!(matches!(ctx.dispatch_count("triple"), Err(ComputeError::UnknownKernel(_))));

    let values = DeviceArray::new(&mut ctx, "values", vec![1i32])?;
    assert!(matches!(
        values.bind(&mut ctx, "triple", 0),
        Err(ComputeError::UnknownKernel(_))
    ));
    Ok(())
}

#[test]
fn binding_after_dispatch_is_rejected() -> ComputeResult<()> {
    let mut ctx = context()?;
    let values = DeviceArray::new(&mut ctx, "values", vec![1i32])?;
    let other = DeviceArray::new(&mut ctx, "other", vec![5i32])?;
    values.bind(&mut ctx, "double", 0)?;
    ctx.dispatch("double", 1)?;

    let err = other.bind(&mut ctx, "double", 0).unwrap_err();
    assert!(matches!(err, ComputeError::BindAfterDispatch { arg: 0, .. }));
    Ok(())
}

#[test]
fn unbound_argument_is_rejected() -> ComputeResult<()> {
    let mut ctx = context()?;
    let total = DeviceArray::<i32>::zeroed(&mut ctx, "total", 1)?;
    total.bind(&mut ctx, "sum", 1)?;
    assert!(matches!(
        ctx.dispatch("sum", 1),
        Err(ComputeError::UnboundArgument { arg: 0, .. })
    ));
    Ok(())
}

#[test]
fn wrong_element_width_is_a_mismatch() -> ComputeResult<()> {
    let mut ctx = context()?;
    let input = DeviceArray::new(&mut ctx, "input", vec![1i32, 2])?;
    let total = DeviceArray::<i32>::zeroed(&mut ctx, "total", 1)?;
    input.bind(&mut ctx, "sum", 0)?;
    total.bind(&mut ctx, "sum", 1)?;
    assert!(matches!(
        ctx.dispatch("sum", 1),
        Err(ComputeError::ArgumentMismatch { arg: 0, .. })
    ));
    Ok(())
}

#[test]
fn released_buffers_cannot_be_used() -> ComputeResult<()> {
    let mut ctx = context()?;
    let mut values = DeviceArray::new(&mut ctx, "values", vec![1i32, 2])?;
    let before = ctx.live_buffer_count();
    values.bind(&mut ctx, "double", 0)?;
    values.release(&mut ctx)?;

    assert_eq!(ctx.live_buffer_count(), before - 1);
    assert!(matches!(values.download(&mut ctx), Err(ComputeError::BufferReleased(_))));
    assert!(matches!(values.upload(&mut ctx), Err(ComputeError::BufferReleased(_))));
    assert!(matches!(ctx.dispatch("double", 2), Err(ComputeError::BufferReleased(_))));
    assert!(matches!(values.release(&mut ctx), Err(ComputeError::BufferReleased(_))));
    assert_eq!(values.host(), &[1, 2]);
    Ok(())
}

#[test]
fn transfers_must_match_allocation() -> ComputeResult<()> {
    let mut ctx = context()?;
    let values = DeviceArray::new(&mut ctx, "values", vec![1i32, 2, 3])?;
    let err = ctx.write(values.handle(), &[0u8; 8]).unwrap_err();
    assert!(matches!(err, ComputeError::SizeMismatch { expected: 12, actual: 8, .. }));
    Ok(())
}

#[test]
fn dispose_releases_everything_once() -> ComputeResult<()> {
    let mut ctx = context()?;
    let values = DeviceArray::new(&mut ctx, "values", vec![0u8; 7])?;
    let _more = DeviceArray::new(&mut ctx, "more", vec![0f32; 3])?;
    assert_eq!(ctx.live_bytes(), 7 + 12);

    ctx.dispose_all()?;
    assert!(ctx.is_disposed());
    assert_eq!(ctx.live_buffer_count(), 0);
    assert_eq!(ctx.live_bytes(), 0);
    assert!(matches!(ctx.dispatch("double", 1), Err(ComputeError::Disposed)));
    assert!(matches!(values.upload(&mut ctx), Err(ComputeError::Disposed)));
    assert!(matches!(ctx.dispose_all(), Err(ComputeError::Disposed)));
    Ok(())
}

/// Backend that keeps no memory and logs every release it receives.
struct ReleaseLog {
    events: Rc<RefCell<Vec<String>>>,
}

impl ReleaseLog {
    fn push(&self, event: impl Into<String>) {
        self.events.borrow_mut().push(event.into());
    }
}

impl ComputeBackend for ReleaseLog {
    fn name(&self) -> &'static str {
        "release-log"
    }

    fn device_name(&self) -> String {
        String::from("none")
    }

    fn compile(&mut self, _kernels: &[&str]) -> ComputeResult<()> {
        Ok(())
    }

    fn create_buffer(&mut self, _desc: BufferDesc<'_>) -> ComputeResult<()> {
        Ok(())
    }

    fn write_buffer(&mut self, _handle: BufferHandle, _bytes: &[u8]) -> ComputeResult<()> {
        Ok(())
    }

    fn read_buffer(&mut self, _handle: BufferHandle, out: &mut [u8]) -> ComputeResult<()> {
        out.fill(0);
        Ok(())
    }

    fn dispatch(
        &mut self,
        _kernel: KernelId,
        _args: &[BufferHandle],
        _work_size: u32,
    ) -> ComputeResult<()> {
        Ok(())
    }

    fn finish(&mut self) -> ComputeResult<()> {
        Ok(())
    }

    fn release_buffer(&mut self, handle: BufferHandle) {
        self.push(format!("buffer {}", handle.index()));
    }

    fn release_kernels(&mut self) {
        self.push("kernels");
    }

    fn release_program(&mut self) {
        self.push("program");
    }

    fn release_queue(&mut self) {
        self.push("queue");
    }

    fn release_device(&mut self) {
        self.push("device");
    }
}

#[test]
fn dispose_releases_buffers_before_kernels_program_queue_device() -> ComputeResult<()> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let backend = ReleaseLog { events: Rc::clone(&events) };
    let mut ctx = ComputeContext::new(Box::new(backend), &["double"])?;

    let first = DeviceArray::new(&mut ctx, "first", vec![1i32])?;
    let second = DeviceArray::new(&mut ctx, "second", vec![2i32])?;
    let third = DeviceArray::new(&mut ctx, "third", vec![3i32])?;
    first.bind(&mut ctx, "double", 0)?;
    second.release(&mut ctx)?;
    events.borrow_mut().clear();

    ctx.dispose_all()?;
    assert_eq!(
        *events.borrow(),
        vec![
            format!("buffer {}", first.handle().index()),
            format!("buffer {}", third.handle().index()),
            String::from("kernels"),
            String::from("program"),
            String::from("queue"),
            String::from("device"),
        ]
    );

    // Dropping a disposed context releases nothing further.
    drop(ctx);
    assert_eq!(events.borrow().len(), 6);
    Ok(())
}

#[test]
fn zero_sized_elements_are_rejected() -> ComputeResult<()> {
    let mut ctx = context()?;
    let err = DeviceArray::<()>::new(&mut ctx, "unit", vec![(); 3]).unwrap_err();
    assert!(matches!(err, ComputeError::ArgumentMismatch { .. }));
    assert_eq!(ctx.live_buffer_count(), 0);
    Ok(())
}
