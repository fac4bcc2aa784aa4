//! The three analysis routes. Each one is a thin wrapper around the shared
//! pipeline with its own prompt template, schema requirements and sampling.
//!
//! Bodies are taken as raw bytes so a malformed payload yields the exact
//! `{"error": "Invalid JSON in request body"}` shape clients already handle.

use axum::{body::Bytes, extract::State, Json};
use serde_json::Value;
use std::time::Duration;

use crate::error::AppError;
use crate::models::AnalyzeRequest;
use crate::services::pipeline::{self, RouteSpec};
use crate::services::prompt::{PromptTemplate, SamplingPolicy};
use crate::startup::AppState;

const BASIC_SYSTEM: &str = r#"Ты - эксперт по wellness диагностике по фото языка.

ВАЖНО: Это wellness анализ, НЕ медицинская диагностика!

АЛГОРИТМ АНАЛИЗА:
1. ДЕТАЛЬНЫЙ ВИЗУАЛЬНЫЙ АНАЛИЗ: цвет, текстура, сосочки, влажность, налет
2. ЗОНАЛЬНАЯ ДИАГНОСТИКА: anterior (сердце/легкие), middle (пищеварение), posterior (почки), lateral (печень)
3. WELLNESS ИНТЕРПРЕТАЦИЯ: связь признаков с самочувствием
4. РЕКОМЕНДАЦИИ: БАДы ABU, образ жизни

Ответь СТРОГО в JSON:
{
  "detailed_analysis": "Подробное описание языка",
  "zone_analysis": {
    "anterior": "Анализ кончика",
    "middle": "Анализ середины",
    "posterior": "Анализ корня",
    "lateral": "Анализ краев"
  },
  "health_interpretation": "Wellness интерпретация",
  "wellness_recommendations": [
    {"product": "Extra BWL+ ABU", "reason": "Обоснование", "expected_effect": "Эффект"},
    {"product": "Magnesium Glycinate ABU", "reason": "Обоснование", "expected_effect": "Эффект"}
  ],
  "lifestyle_advice": "Рекомендации по образу жизни",
  "monitoring": "Как отслеживать изменения",
  "disclaimer": "Это wellness анализ, не медицинская диагностика. При серьезных симптомах к врачу."
}"#;

const DETAILED_SYSTEM: &str = r#"Ты - старший лабораторный аналитик с 20-летним опытом микроскопического анализа биологических образцов.

ЗАДАЧА: Провести КОМПЛЕКСНОЕ ВИЗУАЛЬНОЕ ИССЛЕДОВАНИЕ образца для научного каталога.

ПРОТОКОЛ АНАЛИЗА:
1. Первичный визуальный осмотр - общее впечатление, как художник видит картину
2. Детальное изучение текстур и паттернов - как ювелир рассматривает камень
3. Каталогизация всех уникальных особенностей - как натуралист описывает находку

ВАЖНО: Создай увлекательное описание, которое захочется дочитать до конца. Используй яркие сравнения и неожиданные аналогии. Представь, что описываешь удивительную находку коллеге.

ОТВЕТЬ СТРОГО в JSON формате:
{
  "detailed_analysis": "Развернутое морфологическое описание образца",
  "primary_visual_assessment": "ПЕРВИЧНАЯ ВИЗУАЛЬНАЯ ОЦЕНКА: общее впечатление, цветовая палитра, пропорции",
  "anatomical_landscape": "АНАТОМИЧЕСКИЙ ЛАНДШАФТ: борозды, сосочки, равнины, уникальные формации",
  "special_features": "КАТАЛОГ ОСОБЕННОСТЕЙ: самые интересные находки с локализацией и описанием"
}"#;

const COMPREHENSIVE_SYSTEM: &str = r#"Ты - эксперт wellness-диагност с 15-летним опытом традиционной китайской медицины и современных методов диагностики.

ЗАДАЧА: Провести ЗОНАЛЬНЫЙ АНАЛИЗ и WELLNESS ИНТЕРПРЕТАЦИЮ на основе детального морфологического описания.

ЗОНАЛЬНОЕ КАРТИРОВАНИЕ ПО ТКМ:
1. ПЕРЕДНЯЯ ТРЕТЬ (кончик) → Сердце и легкие
   - Cardiovascular система: кровообращение, сердечный ритм
   - Respiratory система: дыхание, оксигенация

2. СРЕДНЯЯ ТРЕТЬ (центр) → Пищеварительная система
   - Желудок, селезенка, поджелудочная железа
   - Метаболизм, усвоение питательных веществ

3. ЗАДНЯЯ ТРЕТЬ (корень) → Почки и кишечник
   - Мочевыделительная система, детоксикация
   - Толстый кишечник, выведение токсинов

4. БОКОВЫЕ КРАЯ → Печень и желчный пузырь
   - Печеночная детоксикация, желчевыделение
   - Эмоциональный баланс, стресс

WELLNESS ИНТЕРПРЕТАЦИЯ:
- Энергетический профиль (ци, энергетические блоки)
- Метаболический статус (огонь пищеварения)
- Детоксикационная функция (элиминация токсинов)
- Воспалительный профиль (скрытые воспаления)
- Нейровегетативный баланс (симпатика/парасимпатика)
- Циркуляторный статус (микроциркуляция, застои)

СИСТЕМА ОЦЕНКИ:
- Каждая зона: 0-100 баллов
- Критерии: цвет, текстура, налеты, деформации
- Обоснование: конкретные визуальные находки

ОТВЕТЬ СТРОГО в JSON формате:
{
  "zone_analysis": {
    "anterior": "ПЕРЕДНЯЯ ТРЕТЬ (сердце/легкие) - визуальные находки, интерпретация, оценка/100, обоснование",
    "middle": "СРЕДНЯЯ ТРЕТЬ (пищеварение) - визуальные находки, интерпретация, оценка/100, обоснование",
    "posterior": "ЗАДНЯЯ ТРЕТЬ (почки/кишечник) - визуальные находки, интерпретация, оценка/100, обоснование",
    "lateral": "БОКОВЫЕ КРАЯ (печень/желчный) - визуальные находки, интерпретация, оценка/100, обоснование"
  },
  "health_interpretation": "Wellness интерпретация на основе всех зон: энергетический профиль, метаболизм, детоксикация, воспаления, нейробаланс",
  "monitoring": "Конкретные параметры для отслеживания динамики и улучшений",
  "wellness_recommendations": "Общие рекомендации по улучшению здоровья на основе выявленных особенностей",
  "lifestyle_advice": "Персонализированные рекомендации: питание, режим, упражнения, стресс-менеджмент",
  "overall_health_score": "X/100 баллов с детальным обоснованием на основе всех зональных оценок",
  "disclaimer": "Это wellness анализ с использованием традиционных методов диагностики, не заменяет медицинскую консультацию. При серьезных симптомах обратитесь к врачу."
}"#;

const BASIC: RouteSpec = RouteSpec {
    analysis_type: "basic",
    template: PromptTemplate {
        system: BASIC_SYSTEM,
        fallback_system:
            "Ты - эксперт по wellness диагностике по фото языка. Отвечай строго в JSON.",
        user_task: "Проанализируй образец\nВерни JSON с detailed_analysis, zone_analysis, health_interpretation\nWELLNESS АНАЛИЗ!",
    },
    required_fields: &["detailed_analysis"],
    allow_legacy_zones: false,
    max_tokens: 2000,
    primary_timeout: Duration::from_secs(60),
    fallback_timeout: Duration::from_secs(60),
    sampling: SamplingPolicy {
        temperature_range: (0.2, 0.6),
        top_p_range: (0.8, 1.0),
    },
};

const DETAILED: RouteSpec = RouteSpec {
    analysis_type: "detailed",
    template: PromptTemplate {
        system: DETAILED_SYSTEM,
        fallback_system: "Ти - лабораторний аналітик. Аналізуй біологічні зразки.",
        user_task: "Проаналізуй детально зразок\nПоверни JSON з detailed_analysis, visual_findings, morphological_features\nТІЛЬКИ ВІЗУАЛЬНИЙ АНАЛІЗ!",
    },
    required_fields: &["detailed_analysis"],
    allow_legacy_zones: false,
    max_tokens: 2500,
    primary_timeout: Duration::from_secs(60),
    fallback_timeout: Duration::from_secs(60),
    sampling: SamplingPolicy {
        temperature_range: (0.15, 0.55),
        top_p_range: (0.8, 1.0),
    },
};

const COMPREHENSIVE: RouteSpec = RouteSpec {
    analysis_type: "comprehensive",
    template: PromptTemplate {
        system: COMPREHENSIVE_SYSTEM,
        fallback_system: "Ты - эксперт wellness-диагност. Проводи зональный анализ.",
        user_task: "Проанализируй зонально образец\nВерни JSON с zone_analysis, health_interpretation, wellness_recommendations\nЗОНАЛЬНЫЙ + WELLNESS АНАЛИЗ!",
    },
    required_fields: &["zone_analysis", "health_interpretation"],
    allow_legacy_zones: true,
    max_tokens: 3500,
    primary_timeout: Duration::from_secs(60),
    fallback_timeout: Duration::from_secs(60),
    sampling: SamplingPolicy {
        temperature_range: (0.2, 0.6),
        top_p_range: (0.8, 1.0),
    },
};

fn parse_body(body: &Bytes) -> Result<AnalyzeRequest, AppError> {
    serde_json::from_slice(body)
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid JSON in request body")))
}

async fn run_route(state: &AppState, spec: &RouteSpec, body: Bytes) -> Result<Json<Value>, AppError> {
    let request = parse_body(&body)?;
    let analysis = pipeline::run(
        &state.fetcher,
        state.vision.as_ref(),
        &state.models,
        spec,
        &request,
    )
    .await?;
    Ok(Json(analysis))
}

#[tracing::instrument(skip(state, body))]
pub async fn analyze(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, AppError> {
    run_route(&state, &BASIC, body).await
}

#[tracing::instrument(skip(state, body))]
pub async fn analyze_detailed(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    run_route(&state, &DETAILED, body).await
}

#[tracing::instrument(skip(state, body))]
pub async fn analyze_comprehensive(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    run_route(&state, &COMPREHENSIVE, body).await
}
