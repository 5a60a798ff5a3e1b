//! Prompt templates (Brazilian Portuguese, the channel's language).

use chrono::{DateTime, Datelike, FixedOffset, Weekday};

const WEEKDAYS: [&str; 7] = [
    "Segunda-feira",
    "Terça-feira",
    "Quarta-feira",
    "Quinta-feira",
    "Sexta-feira",
    "Sábado",
    "Domingo",
];

const MONTHS: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "março",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

/// Local date rendered for prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtDate {
    pub weekday: &'static str,
    /// e.g. "14 de outubro"
    pub day_month: String,
}

impl PtDate {
    pub fn from_local(now: DateTime<FixedOffset>) -> Self {
        let weekday = match now.weekday() {
            Weekday::Mon => WEEKDAYS[0],
            Weekday::Tue => WEEKDAYS[1],
            Weekday::Wed => WEEKDAYS[2],
            Weekday::Thu => WEEKDAYS[3],
            Weekday::Fri => WEEKDAYS[4],
            Weekday::Sat => WEEKDAYS[5],
            Weekday::Sun => WEEKDAYS[6],
        };
        let month = MONTHS[now.month0() as usize];
        Self {
            weekday,
            day_month: format!("{} de {}", now.day(), month),
        }
    }
}

pub const DIGEST_SYSTEM: &str = "Você é um curador de notícias de GameFi, Web3 Gaming e do mercado cripto.
Você recebe uma lista de notícias reais e recentes e escolhe as 5 mais relevantes:
exatamente 3 de GAMEFI e 2 de CRYPTO, conforme a categoria indicada em cada item.
Use somente as notícias fornecidas, sem inventar dados.
Siga o formato pedido ao pé da letra.
Responda apenas com o resumo final, sem tags nem comentários sobre o processo.";

pub const HIGHLIGHT_SYSTEM: &str = "Você é um analista de GameFi, Web3 Gaming e Crypto Gaming.
Você recebe uma lista de notícias reais e recentes e escolhe a MAIS relevante para uma análise.
Use somente as notícias fornecidas, sem inventar dados.
Inclua sempre o URL real da notícia escolhida.
Siga o formato pedido ao pé da letra.
Responda apenas com o texto final, sem tags nem comentários sobre o processo.";

pub fn digest_prompt(date: &PtDate) -> String {
    format!(
        "Monte o resumo diário do canal sobre GameFi e Web3 Gaming.

DATA DE HOJE: {day_month}
DIA DA SEMANA: {weekday}

ABERTURA:
Bom dia!
[Comentário curto ligado ao dia da semana] e trazemos aqui o que você precisa saber hoje, {day_month} 👇

CINCO NOTÍCIAS, cada uma no formato:
[EMOJI DO TEMA] **[Título forte em negrito].** [Um ou dois dados concretos e o contexto mínimo.]

REGRAS:
- Emojis ligados ao tema: 💰 investimento, 📈📉 mercado, 🎮 jogos, 🤖 tecnologia, 💀 problemas, 🚀 crescimento, 👥 comunidade.
- No máximo duas linhas por notícia, com números relevantes e tom direto, sem hype.
- Nada de rumores, linguagem promocional ou notícias repetidas.
- Priorize rodadas de investimento, grandes lançamentos, movimentos de mercado acima de 10% e parcerias importantes.
- Retorne apenas o resumo formatado, sem tags <search> ou <thinking>.",
        day_month = date.day_month,
        weekday = date.weekday,
    )
}

pub const DIGEST_CLOSING: &str = "Agora crie o resumo diário com as 5 notícias MAIS RELEVANTES da lista acima, seguindo EXATAMENTE o formato pedido.

SELEÇÃO:
- 3 notícias de GAMEFI/Web3 Gaming (Categoria: GAMEFI)
- 2 notícias do MERCADO CRYPTO (Categoria: CRYPTO)
- Todas as notícias da lista são inéditas no canal
- Priorize as de maior impacto em cada categoria";

pub fn highlight_prompt(date: &PtDate) -> String {
    format!(
        "Escreva a postagem de destaque do canal sobre a notícia mais relevante de GameFi/Web3 Gaming.

DATA DE HOJE: {day_month}

ESTRUTURA:

**[EMOJI] [MANCHETE QUE DESPERTA CURIOSIDADE]**

[Introdução de uma ou duas linhas sobre o que aconteceu]

**[EMOJI] Os fatos:**
- [Dado principal]
- [Dado de apoio]
- [Dado de apoio]

**[EMOJI] O que significa:**
[Uma ou duas linhas de análise]

**[Pergunta final que convide à discussão]**

📎 **Fonte:**
[URL completo da notícia escolhida, começando com https://]

REGRAS:
- Entre 500 e 700 caracteres, português brasileiro, de dois a quatro emojis.
- Sempre com números concretos: valores, percentuais, datas.
- No máximo três itens ou três linhas por seção.
- Critérios de escolha: impacto financeiro, tecnologia, grandes lançamentos, dados de usuários, regulação, parcerias.
- Retorne apenas a postagem, sem tags <search> ou <thinking>.",
        day_month = date.day_month,
    )
}

pub const HIGHLIGHT_CLOSING: &str = "Agora escolha a notícia MAIS RELEVANTE da lista acima e escreva a análise seguindo EXATAMENTE a estrutura pedida. Use o URL real da notícia escolhida.

Todas as notícias listadas são inéditas no canal: escolha a de maior impacto para o público GameFi.";
