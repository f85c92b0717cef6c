// src/glossary/builtin.rs
//! Seed terms available even when the dataset omits them.

pub(crate) struct BuiltinTerm {
    pub term: &'static str,
    pub category: &'static str,
    pub definition: &'static str,
    pub importance: &'static str,
    pub analogy: &'static str,
}

pub(crate) const BUILTIN_TERMS: &[BuiltinTerm] = &[
    BuiltinTerm {
        term: "양적완화",
        category: "통화정책",
        definition: "중앙은행이 국채 등 자산을 대량으로 사들여 시중에 돈을 직접 공급하는 정책입니다.",
        importance: "금리를 더 내리기 어려울 때 경기를 떠받치는 수단이라 자산 가격과 환율에 큰 영향을 줍니다.",
        analogy: "메마른 논에 저수지 물을 한꺼번에 풀어 주는 것과 비슷합니다.",
    },
    BuiltinTerm {
        term: "기준금리",
        category: "통화정책",
        definition: "한 나라의 중앙은행이 정하는 대표 금리로, 시중 금리의 출발점이 됩니다.",
        importance: "대출 이자, 예금 이자, 주식과 부동산 가격이 모두 기준금리를 따라 움직입니다.",
        analogy: "온 동네 수도 요금의 기본 단가를 정하는 것과 같습니다.",
    },
    BuiltinTerm {
        term: "배당",
        category: "주식",
        definition: "회사가 벌어들인 이익의 일부를 주주에게 나눠 주는 것입니다.",
        importance: "주가 변동과 별개로 꾸준한 현금 수입이 되어 장기 투자 판단의 근거가 됩니다.",
        analogy: "함께 차린 가게에서 남은 이익을 동업자끼리 나눠 갖는 것과 같습니다.",
    },
    BuiltinTerm {
        term: "PER",
        category: "주식",
        definition: "주가를 주당순이익으로 나눈 값으로, 이익에 비해 주가가 얼마나 비싼지 보여 줍니다.",
        importance: "같은 업종 기업끼리 비교하면 주가가 고평가인지 저평가인지 가늠할 수 있습니다.",
        analogy: "연 매출 대비 가게 권리금이 몇 년 치인지 따져 보는 것과 비슷합니다.",
    },
    BuiltinTerm {
        term: "환율",
        category: "외환",
        definition: "한 나라 돈을 다른 나라 돈으로 바꿀 때 적용되는 교환 비율입니다.",
        importance: "수입 물가, 해외여행 경비, 수출 기업 실적이 모두 환율에 따라 달라집니다.",
        analogy: "나라별 돈 사이의 시장 가격표라고 생각하면 됩니다.",
    },
];
