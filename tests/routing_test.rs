use treebench::context_tools::*;
use treebench::routing::CrossbarContext;
use treebench::simulation::*;
use treebench::utility_contexts::*;

/// Addresses each packet by its payload.
#[context_macro]
struct StampContext {
    input: Receiver<Packet<u32>>,
    output: Sender<Packet<u32>>,
    modulus: u32,
}

impl StampContext {
    fn new(input: Receiver<Packet<u32>>, output: Sender<Packet<u32>>, modulus: u32) -> Self {
        let ctx = Self {
            input,
            output,
            modulus,
            context_info: Default::default(),
        };
        ctx.input.attach_receiver(&ctx);
        ctx.output.attach_sender(&ctx);
        ctx
    }
}

impl Context for StampContext {
    fn run(&mut self) -> anyhow::Result<()> {
        while let Ok(pkt) = self.input.dequeue() {
            let dest = (pkt.data % self.modulus) as usize;
            self.output.enqueue(pkt.with_dest(dest))?;
        }
        Ok(())
    }
}

#[test]
fn demux_drops_and_reports_bad_destinations() {
    const TEST_SIZE: u32 = 40;
    const OUTPUTS: usize = 3;

    let mut parent = ProgramBuilder::default();
    let mut routed = vec![];
    for offset in 0..2 {
        let (gen_snd, gen_rcv) = parent.bounded(4);
        let (stamp_snd, stamp_rcv) = parent.bounded(4);
        parent.add_child(GeneratorContext::new(
            move || (0..TEST_SIZE).map(move |i| Packet::new(i as usize, i + offset)),
            gen_snd,
        ));
        parent.add_child(StampContext::new(gen_rcv, stamp_snd, OUTPUTS as u32 + 1));
        routed.push(stamp_rcv);
    }

    let mut outputs = vec![];
    for _ in 0..OUTPUTS {
        let (snd, rcv) = parent.bounded(2);
        outputs.push(snd);
        parent.add_child(ConsumerContext::new(rcv));
    }
    parent.add_child(CrossbarContext::new(routed, outputs).unwrap());

    let executed = parent
        .initialize(InitializationOptionsBuilder::default().build().unwrap())
        .unwrap()
        .run(RunOptions::default());
    executed.dump_failures();
    assert!(executed.passed());

    let bad: Vec<_> = (0..2u32)
        .flat_map(|offset| (0..TEST_SIZE).map(move |i| i + offset))
        .filter(|data| *data % 4 == 3)
        .collect();
    let diagnostics: Vec<_> = executed.diagnostics().map(|(_, diag)| diag.clone()).collect();
    assert_eq!(diagnostics.len(), bad.len());
    assert!(diagnostics
        .iter()
        .all(|diag| matches!(diag, Diagnostic::Misrouted { dest: 3, .. })));

    let consumed: usize = executed
        .summaries()
        .iter()
        .filter(|summary| summary.id.name == "ConsumerContext")
        .map(|summary| summary.processed)
        .sum();
    assert_eq!(consumed, 2 * TEST_SIZE as usize - bad.len());
}

/// A failing stage is reported without taking the rest of the program down.
#[test]
fn mismatch_is_reported_as_failure() {
    let mut parent = ProgramBuilder::default();
    let (snd, rcv) = parent.unbounded();
    let (out_snd, out_rcv) = parent.unbounded();
    let (other_snd, other_rcv) = parent.unbounded();
    parent.add_child(GeneratorContext::new(|| (0..20).map(|i| Packet::new(i, i)), snd));
    parent.add_child(CrossbarContext::new(vec![rcv], vec![out_snd, other_snd]).unwrap());
    parent.add_child(CheckerContext::new(|| (0..20).map(|i| Packet::new(i, i)), out_rcv));
    parent.add_child(CheckerContext::new(
        || (10..30).map(|i| Packet::new(i, i)),
        other_rcv,
    ));

    let executed = parent
        .initialize(InitializationOptions::default())
        .unwrap()
        .run(RunOptions::default());
    executed.dump_failures();
    assert!(!executed.passed());
    assert_eq!(executed.failures().len(), 1);
    assert_eq!(executed.failures()[0].id.name, "CheckerContext");
}

#[test]
fn dangling_channels_are_rejected() {
    let mut parent = ProgramBuilder::default();
    let (snd, _rcv) = parent.bounded::<Packet<u32>>(1);
    parent.add_child(GeneratorContext::new(|| std::iter::empty(), snd));
    assert!(matches!(
        parent.initialize(InitializationOptions::default()),
        Err(InitializationError::DisconnectedReceiver(_))
    ));
}

#[test]
fn cycles_are_rejected_unless_allowed() {
    let build = || {
        let mut parent = ProgramBuilder::default();
        let (ab_snd, ab_rcv) = parent.bounded::<Packet<u32>>(1);
        let (ba_snd, ba_rcv) = parent.bounded::<Packet<u32>>(1);
        parent.add_child(StampContext::new(ab_rcv, ba_snd, 1));
        parent.add_child(StampContext::new(ba_rcv, ab_snd, 1));
        parent
    };

    assert!(matches!(
        build().initialize(InitializationOptions::default()),
        Err(InitializationError::Cycle(_))
    ));
    let relaxed = InitializationOptionsBuilder::default()
        .check_acyclic(false)
        .build()
        .unwrap();
    assert!(build().initialize(relaxed).is_ok());
}
