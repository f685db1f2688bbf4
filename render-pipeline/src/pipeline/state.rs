use state_machines::state_machine;

state_machine! {
    name: RenderMachine,
    state: RenderState,
    initial: Locked,
    states: [Locked, Parsed, KpisComputed, Scripted, Rendered, Stitched, Completed, Failed],
    events {
        parse { transition: { from: Locked, to: Parsed } }
        compute_kpis { transition: { from: Parsed, to: KpisComputed } }
        script { transition: { from: KpisComputed, to: Scripted } }
        render { transition: { from: Scripted, to: Rendered } }
        stitch { transition: { from: Rendered, to: Stitched } }
        finalize { transition: { from: Stitched, to: Completed } }
        abort {
            transition: { from: Locked, to: Failed }
            transition: { from: Parsed, to: Failed }
            transition: { from: KpisComputed, to: Failed }
            transition: { from: Scripted, to: Failed }
            transition: { from: Rendered, to: Failed }
            transition: { from: Stitched, to: Failed }
        }
    }
}

pub fn locked() -> RenderMachine<(), Locked> {
    RenderMachine::new(())
}
