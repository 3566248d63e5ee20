//! Benchmarks for the per-signal hot path: rule matching and template
//! rendering.
//!
//! An organization with a few hundred active rules is matched against a
//! stream of signals, and a realistic notification template is rendered
//! against a signal context.

use std::collections::BTreeMap;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;
use uuid::Uuid;

use dealpilot_automation::matcher::{self, PreparedRule};
use dealpilot_automation::template::{render, TemplateContext};
use dealpilot_core::types::{ActionType, AutomationRule, Signal, Timestamp, TriggerType};

fn generate_rules(org_id: Uuid, count: usize) -> Vec<PreparedRule> {
    (0..count)
        .map(|i| {
            let trigger = TriggerType::ALL[i % TriggerType::ALL.len()];
            PreparedRule::new(AutomationRule {
                id: Uuid::new_v4(),
                org_id,
                name: format!("rule {}", i),
                description: None,
                is_active: i % 10 != 0,
                trigger_type: trigger,
                call_type_filter: None,
                action_type: ActionType::CreateTask,
                action_config: json!({
                    "title_template": "Follow up with {{deal_name}} after {{meeting_title}}",
                    "due_days": i % 7,
                }),
                min_confidence: (i % 10) as f64 / 10.0,
                cooldown_hours: 24,
                created_by: None,
                created_at: Timestamp(1_700_000_000 + i as i64),
                updated_at: Timestamp(1_700_000_000 + i as i64),
            })
        })
        .collect()
}

fn generate_signal(org_id: Uuid, index: usize) -> Signal {
    let mut context = BTreeMap::new();
    context.insert("deal_name".to_string(), json!(format!("Deal {}", index)));
    context.insert("meeting_title".to_string(), json!("Quarterly review"));
    context.insert("amount".to_string(), json!(48_000 + index));
    context.insert(
        "contact".to_string(),
        json!({"name": "Jordan Lee", "title": "VP Operations"}),
    );
    Signal {
        trigger_type: TriggerType::ALL[index % TriggerType::ALL.len()],
        confidence: (index % 100) as f64 / 100.0,
        call_type_id: Some(Uuid::new_v4()),
        deal_id: Uuid::new_v4(),
        meeting_id: Some(Uuid::new_v4()),
        org_id,
        context,
        observed_at: Timestamp(1_700_000_000),
    }
}

fn bench_matching(c: &mut Criterion) {
    let org_id = Uuid::new_v4();
    let rules = generate_rules(org_id, 400);
    let signals: Vec<Signal> = (0..1000).map(|i| generate_signal(org_id, i)).collect();

    let mut group = c.benchmark_group("rule_matching");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("candidates_400_rules", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let signal = &signals[idx % signals.len()];
            idx += 1;
            matcher::candidates(signal, &rules).len()
        });
    });

    group.bench_function("prepare_400_rules", |b| {
        let raw: Vec<AutomationRule> = rules.iter().map(|p| p.rule.clone()).collect();
        b.iter(|| {
            raw.iter()
                .cloned()
                .map(PreparedRule::new)
                .collect::<Vec<_>>()
        });
    });

    group.finish();
}

fn bench_rendering(c: &mut Criterion) {
    let org_id = Uuid::new_v4();
    let signals: Vec<Signal> = (0..1000).map(|i| generate_signal(org_id, i)).collect();
    let template = "{{contact.name}} ({{contact.title}}) on {{deal_name}} asked about \
                    pricing during {{meeting_title}}. Confidence {{confidence}}, \
                    amount {{amount}}.";

    let mut group = c.benchmark_group("template_rendering");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("context_and_render", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let signal = &signals[idx % signals.len()];
            idx += 1;
            render(template, &TemplateContext::from_signal(signal))
        });
    });

    let ctx = TemplateContext::from_signal(&signals[0]);
    group.bench_function("render_only", |b| b.iter(|| render(template, &ctx)));

    group.finish();
}

criterion_group!(benches, bench_matching, bench_rendering);
criterion_main!(benches);
