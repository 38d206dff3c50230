//! Fuzz target: RAPI line assembly, parsing and client dispatch.
//!
//! Drives arbitrary byte sequences through the line assembler and the
//! parser, then through a client with a command pending, and asserts
//! that nothing panics and at most one completion ever runs.
//!
//! cargo fuzz run fuzz_rapi_line

#![no_main]

use evsewifi::rapi::codec::{LINE_CAP, LineAssembler, LineEvent, parse_line};
use evsewifi::rapi::{MemoryTransport, RapiClient};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut asm = LineAssembler::new();
    for &b in data {
        if let Some(LineEvent::Line(line)) = asm.push(b) {
            assert!(line.len() <= LINE_CAP);
            if let Ok(parsed) = parse_line(&line) {
                assert!(!parsed.tokens.is_empty());
            }
        }
    }

    let mut client: RapiClient<MemoryTransport, u32> = RapiClient::new(MemoryTransport::new(), 0);
    if client.send_command("$GS", |n: &mut u32, _| *n += 1).is_err() {
        return;
    }
    client.transport_mut().inject(data);

    let mut completions = 0u32;
    for _ in 0..data.len() + 1 {
        client.pump(&mut completions);
    }
    assert!(completions <= 1, "one pending command completed twice");
});
