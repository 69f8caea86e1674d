use serde_json::json;

use eerc_common::codec::public_signals;
use eerc_test_fixtures::fixtures;

fn main() {
    let fixtures = fixtures();
    let samples: Vec<_> = fixtures
        .samples()
        .into_iter()
        .map(|sample| {
            json!({
                "operation": sample.kind.as_str(),
                "inputs": serde_json::to_value(&sample.inputs).expect("inputs json"),
                "public_signals": public_signals(&sample.public_inputs),
                "proof": sample.canonical.decimal_words(),
                "proof_hex": sample.canonical.to_hex(),
            })
        })
        .collect();

    println!(
        "{}",
        serde_json::to_string_pretty(&samples).expect("serialize samples")
    );
}
