//! Walkthrough of `MuleDetectionEngine::analyze` over a small synthetic CSV,
//! narrated step by step in the style of the teacher's
//! `examples/validate_transactions.rs`.

use mule_detection_engine::MuleDetectionEngine;

fn main() {
    env_logger::init();

    println!("=== Mule Detection Engine Demo ===\n");

    let engine = MuleDetectionEngine::new();

    println!("Step 1: A clean three-hop chain with no red flags");
    let clean_csv = "sender_id,receiver_id,amount,timestamp\n\
                      ALICE,BOB,150.00,2026-01-01T09:00:00Z\n\
                      BOB,CAROL,140.00,2026-01-03T11:00:00Z\n";
    run_and_report(&engine, clean_csv);

    println!("\nStep 2: A laundering ring (A -> B -> C -> A)");
    let cycle_csv = "sender_id,receiver_id,amount,timestamp\n\
                      ACC1,ACC2,25000,2026-02-01T00:00:00Z\n\
                      ACC2,ACC3,25000,2026-02-01T04:00:00Z\n\
                      ACC3,ACC1,25000,2026-02-01T08:00:00Z\n";
    run_and_report(&engine, cycle_csv);

    println!("\nStep 3: A smurfing hub fed by many small senders");
    let mut smurf_csv = String::from("sender_id,receiver_id,amount,timestamp\n");
    for i in 0..7 {
        smurf_csv.push_str(&format!(
            "DONOR{i},COLLECTOR,900,2026-03-01T{:02}:00:00Z\n",
            i
        ));
    }
    run_and_report(&engine, &smurf_csv);

    println!("\nStep 4: A high-volume merchant that should NOT be flagged");
    let mut merchant_csv = String::from("sender_id,receiver_id,amount,timestamp\n");
    for i in 0..12 {
        merchant_csv.push_str(&format!(
            "CUSTOMER{i},BIGSTORE,{},2026-{:02}-01T00:00:00Z\n",
            40 + i,
            1 + i % 11
        ));
    }
    run_and_report(&engine, &merchant_csv);

    println!("\nStep 5: Malformed input (missing required columns)");
    match engine.analyze("foo,bar\n1,2\n") {
        Ok(_) => println!("  unexpected success"),
        Err(e) => println!("  rejected as expected: {e}"),
    }

    println!("\n=== Demo complete ===");
}

fn run_and_report(engine: &MuleDetectionEngine, csv: &str) {
    match engine.analyze(csv) {
        Ok(result) => {
            println!(
                "  accounts analyzed: {}, suspicious: {}, rings: {}",
                result.summary.total_accounts_analyzed,
                result.summary.suspicious_accounts_flagged,
                result.summary.fraud_rings_detected,
            );
            for account in &result.suspicious_accounts {
                println!(
                    "    -> {} scored {} ({})",
                    account.account_id,
                    account.suspicion_score,
                    account.detected_patterns.join(", ")
                );
            }
        }
        Err(e) => println!("  analysis failed: {e}"),
    }
}
